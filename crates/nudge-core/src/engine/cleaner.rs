use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Obsolete, ReminderStore};

/// Row counts removed by one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub submitted: usize,
    pub overdue: usize,
    pub exhausted: usize,
    pub orphaned_logs: usize,
    /// Labels of the steps that failed; the remaining steps still ran.
    pub failed_steps: Vec<String>,
}

impl CleanupReport {
    pub fn reminders_removed(&self) -> usize {
        self.submitted + self.overdue + self.exhausted
    }
}

/// Removes reminders that can never produce a useful notification again.
#[derive(Debug, Clone)]
pub struct Cleaner {
    overdue_grace: Duration,
}

impl Cleaner {
    pub fn new(overdue_grace: Duration) -> Self {
        Self { overdue_grace }
    }

    /// Run the four deletions in order. Each step is best-effort.
    pub fn run<S: ReminderStore>(&self, store: &S, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let steps = [
            Obsolete::TaskSubmitted,
            Obsolete::OverdueBeyond {
                now,
                grace: self.overdue_grace,
            },
            Obsolete::BudgetExhausted,
        ];
        for predicate in steps {
            match store.delete_reminders_where(predicate) {
                Ok(n) => {
                    tracing::debug!("deleted {n} reminders: {}", predicate.label());
                    match predicate {
                        Obsolete::TaskSubmitted => report.submitted = n,
                        Obsolete::OverdueBeyond { .. } => report.overdue = n,
                        Obsolete::BudgetExhausted => report.exhausted = n,
                    }
                }
                Err(e) => {
                    tracing::warn!("cleanup step '{}' failed: {e}", predicate.label());
                    report.failed_steps.push(predicate.label().to_string());
                }
            }
        }

        match store.delete_orphaned_logs() {
            Ok(n) => report.orphaned_logs = n,
            Err(e) => {
                tracing::warn!("cleanup step 'orphaned logs' failed: {e}");
                report.failed_steps.push("orphaned logs".to_string());
            }
        }

        tracing::info!(
            submitted = report.submitted,
            overdue = report.overdue,
            exhausted = report.exhausted,
            orphaned_logs = report.orphaned_logs,
            "cleanup pass finished"
        );
        report
    }
}
