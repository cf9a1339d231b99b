//! Store gateway consumed by the reminder engine.
//!
//! `ReminderStore` is the query surface for one connection. `StoreConnector`
//! hands out a fresh store at the start of each cycle; the engine drops it at
//! cycle end, so the connection is released on every exit path.

pub mod sqlite;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::reminder::{AttemptLog, ReminderId, ReminderWithTask};

pub use sqlite::{SqliteConnector, SqliteStore};

/// Parameters of the candidate query for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateQuery {
    pub now: DateTime<Utc>,
    /// Width of the firing window; equal to the tick interval.
    pub tick_interval: Duration,
    /// Tasks overdue by more than this are never candidates.
    pub overdue_grace: Duration,
}

/// Deletion predicates used by the obsolescence cleaner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obsolete {
    /// The reminder's task has been submitted.
    TaskSubmitted,
    /// The task was due more than `grace` before `now`.
    OverdueBeyond { now: DateTime<Utc>, grace: Duration },
    /// The count of `sent` attempts has reached the reminder's frequency.
    BudgetExhausted,
}

impl Obsolete {
    pub fn label(&self) -> &'static str {
        match self {
            Obsolete::TaskSubmitted => "task submitted",
            Obsolete::OverdueBeyond { .. } => "task overdue beyond grace",
            Obsolete::BudgetExhausted => "notification budget exhausted",
        }
    }
}

/// Queries the engine needs against the persistent store.
pub trait ReminderStore {
    /// Active reminders on unsubmitted, not-abandoned tasks whose firing
    /// instant lies in `(now - tick_interval, now]`.
    ///
    /// The outer error means the query could not run. Each row is decoded on
    /// its own, so one malformed reminder surfaces as one inner error and the
    /// other rows are still returned.
    fn find_candidate_reminders(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<Result<ReminderWithTask>>>;

    /// Number of `sent` attempts for `reminder_id` strictly after `since`.
    fn count_recent_sent(&self, reminder_id: ReminderId, since: DateTime<Utc>) -> Result<u32>;

    /// Number of `sent` attempts for `reminder_id` over its whole life.
    fn count_total_sent(&self, reminder_id: ReminderId) -> Result<u32>;

    fn insert_attempt_log(&self, log: &AttemptLog) -> Result<()>;

    /// Delete every reminder matching `predicate`; returns the affected count.
    fn delete_reminders_where(&self, predicate: Obsolete) -> Result<usize>;

    /// Delete attempt logs whose reminder no longer exists.
    fn delete_orphaned_logs(&self) -> Result<usize>;

    /// Active reminders on unsubmitted tasks whose firing instant lies in
    /// `(now, now + horizon]`, earliest first.
    fn upcoming_reminders(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ReminderWithTask>>;
}

/// Hands out one store per processing cycle.
pub trait StoreConnector: Send + Sync {
    type Store: ReminderStore;

    /// Open a connection. Failures here surface as `StoreUnavailable`.
    fn connect(&self) -> Result<Self::Store>;
}
