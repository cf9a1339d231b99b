//! Records the engine reads and writes.
//!
//! Tasks and reminders are owned by external write paths; the engine only
//! reads them and deletes reminders once they are obsolete. Attempt logs are
//! append-only and written exactly once per dispatch attempt.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttemptOutcome, ChannelKind, TaskStatus};

pub type ReminderId = i64;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A gradeable deliverable with a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub course_name: String,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        course_name: impl Into<String>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            course_name: course_name.into(),
            due_at,
            status: TaskStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Reminder
// ---------------------------------------------------------------------------

/// A student's standing request to be notified about one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub student_id: i64,
    pub task_id: String,
    pub task_name: String,
    /// Notify this many hours before the task is due.
    pub lead_hours: u32,
    /// Maximum number of successful notifications over the reminder's life.
    pub frequency: u32,
    pub channel: ChannelKind,
    pub destination: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the creation flow; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub student_id: i64,
    pub task_id: String,
    pub task_name: String,
    pub lead_hours: u32,
    pub frequency: u32,
    pub channel: ChannelKind,
    pub destination: String,
}

// ---------------------------------------------------------------------------
// ReminderWithTask
// ---------------------------------------------------------------------------

/// Typed projection of an active reminder joined with its task and student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderWithTask {
    pub reminder: Reminder,
    pub student_name: String,
    pub course_name: String,
    pub due_at: DateTime<Utc>,
    pub task_status: TaskStatus,
}

impl ReminderWithTask {
    pub fn id(&self) -> ReminderId {
        self.reminder.id
    }

    /// The instant this reminder is meant to fire: `due_at - lead_hours`.
    pub fn fire_at(&self) -> DateTime<Utc> {
        fire_at(self.due_at, self.reminder.lead_hours)
    }
}

pub fn fire_at(due_at: DateTime<Utc>, lead_hours: u32) -> DateTime<Utc> {
    due_at - Duration::hours(i64::from(lead_hours))
}

/// Whether a reminder firing at `fire_at` belongs to the tick at `now`.
///
/// The window is half-open, `(now - tick, now]`, so consecutive ticks exactly
/// one interval apart partition time without overlap.
pub fn in_firing_window(fire_at: DateTime<Utc>, now: DateTime<Utc>, tick: Duration) -> bool {
    fire_at <= now && fire_at > now - tick
}

// ---------------------------------------------------------------------------
// AttemptLog
// ---------------------------------------------------------------------------

/// Immutable record of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub reminder_id: ReminderId,
    pub channel: ChannelKind,
    pub destination: String,
    pub outcome: AttemptOutcome,
    pub sent_at: DateTime<Utc>,
}

impl AttemptLog {
    pub fn new(
        candidate: &ReminderWithTask,
        outcome: AttemptOutcome,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reminder_id: candidate.reminder.id,
            channel: candidate.reminder.channel,
            destination: candidate.reminder.destination.clone(),
            outcome,
            sent_at,
        }
    }
}
