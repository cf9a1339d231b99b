//! Urgency context handed to a channel for rendering.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::reminder::ReminderWithTask;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Urgency {
    /// Past due; `hours` is the whole hours overdue (at least 1).
    Overdue { hours: i64 },
    /// Due in under an hour.
    DueWithinHour { minutes: i64 },
    Upcoming { hours: i64 },
}

impl Urgency {
    /// Classify the time left until `due_at`.
    ///
    /// Whole hours and minutes are floored, so 30 minutes past due is one
    /// hour overdue and 59 minutes left is zero hours.
    pub fn between(now: DateTime<Utc>, due_at: DateTime<Utc>) -> Self {
        let remaining_ms = due_at.timestamp_millis() - now.timestamp_millis();
        let hours = remaining_ms.div_euclid(HOUR_MS);
        let minutes = remaining_ms.div_euclid(MINUTE_MS);
        if hours < 0 {
            Urgency::Overdue { hours: -hours }
        } else if hours == 0 {
            Urgency::DueWithinHour { minutes }
        } else {
            Urgency::Upcoming { hours }
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Overdue { hours } => write!(f, "OVERDUE by {hours} hours"),
            Urgency::DueWithinHour { minutes } => write!(f, "due in {minutes} minutes"),
            Urgency::Upcoming { hours } => write!(f, "due in {hours} hours"),
        }
    }
}

/// Everything a channel may put into a reminder message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub urgency: Urgency,
    pub student_name: String,
    pub task_name: String,
    pub course_name: String,
    pub due_at: DateTime<Utc>,
}

impl Notice {
    pub fn for_candidate(candidate: &ReminderWithTask, now: DateTime<Utc>) -> Self {
        Self {
            urgency: Urgency::between(now, candidate.due_at),
            student_name: candidate.student_name.clone(),
            task_name: candidate.reminder.task_name.clone(),
            course_name: candidate.course_name.clone(),
            due_at: candidate.due_at,
        }
    }

    pub fn due_label(&self) -> String {
        self.due_at.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}
