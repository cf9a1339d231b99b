use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::reminder::{in_firing_window, ReminderWithTask};
use crate::store::{CandidateQuery, ReminderStore};

/// Reminders due this tick, plus the rows that could not be decoded.
#[derive(Debug, Default)]
pub struct Selection {
    pub candidates: Vec<ReminderWithTask>,
    pub undecodable: usize,
}

/// Picks the reminders whose firing instant fell inside the current tick.
///
/// The window alone does not prevent duplicates when ticks run more often
/// than once per window width; the dispatcher's recency guard covers that.
#[derive(Debug, Clone)]
pub struct Selector {
    tick_interval: Duration,
    overdue_grace: Duration,
}

impl Selector {
    pub fn new(tick_interval: Duration, overdue_grace: Duration) -> Self {
        Self {
            tick_interval,
            overdue_grace,
        }
    }

    /// A malformed row is logged and counted; it never hides the others.
    pub fn candidates<S: ReminderStore>(&self, store: &S, now: DateTime<Utc>) -> Result<Selection> {
        let query = CandidateQuery {
            now,
            tick_interval: self.tick_interval,
            overdue_grace: self.overdue_grace,
        };
        let mut selection = Selection::default();
        for row in store.find_candidate_reminders(&query)? {
            match row {
                Ok(candidate) => selection.candidates.push(candidate),
                Err(e) => {
                    tracing::warn!("skipping undecodable reminder: {e}");
                    selection.undecodable += 1;
                }
            }
        }
        debug_assert!(selection
            .candidates
            .iter()
            .all(|c| in_firing_window(c.fire_at(), now, self.tick_interval)));
        tracing::debug!("{} reminders due for processing", selection.candidates.len());
        Ok(selection)
    }
}
