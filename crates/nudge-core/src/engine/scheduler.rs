//! The per-tick driver: clean, select, dispatch.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channels;
use crate::config::EnginePolicy;
use crate::error::Result;
use crate::reminder::ReminderWithTask;
use crate::store::{ReminderStore, StoreConnector};
use crate::types::ChannelKind;

use super::cleaner::{Cleaner, CleanupReport};
use super::dispatch::{DispatchOutcome, Dispatcher};
use super::selector::{Selection, Selector};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of one processing cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Candidates considered.
    pub attempted: usize,
    /// Candidates that fired (delivered and logged as `sent`).
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Candidates abandoned because a store query failed.
    pub errored: usize,
    pub cleanup: CleanupReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errored: 0,
            cleanup: CleanupReport::default(),
            started_at,
            finished_at: started_at,
        }
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        if self.succeeded > 0 {
            format!(
                "Successfully processed {} out of {} reminders",
                self.succeeded, self.attempted
            )
        } else {
            format!(
                "No reminders due at this time (checked {} active reminders)",
                self.attempted
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub tick_interval_secs: u64,
    pub recency_window_secs: u64,
    pub cycles_run: u64,
    pub channels: Vec<ChannelKind>,
    pub last_report: Option<CycleReport>,
}

// ---------------------------------------------------------------------------
// CycleRunner
// ---------------------------------------------------------------------------

/// The entry points the HTTP surface and the ticker drive.
pub trait CycleRunner: Send + Sync {
    /// Run one cycle now. Concurrent callers are serialized.
    fn trigger_once(&self) -> Result<CycleReport>;

    fn status(&self) -> SchedulerStatus;

    fn upcoming(&self, horizon: Duration) -> Result<Vec<ReminderWithTask>>;
}

// ---------------------------------------------------------------------------
// ReminderEngine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EngineState {
    cycles_run: u64,
    last_report: Option<CycleReport>,
}

pub struct ReminderEngine<C: StoreConnector> {
    connector: C,
    policy: EnginePolicy,
    cleaner: Cleaner,
    selector: Selector,
    dispatcher: Dispatcher,
    /// Held for the whole cycle so timer and manual triggers never overlap.
    flight: Mutex<()>,
    state: Mutex<EngineState>,
}

impl<C: StoreConnector> ReminderEngine<C> {
    pub fn new(connector: C, channels: Channels, policy: EnginePolicy) -> Self {
        Self {
            cleaner: Cleaner::new(policy.overdue_grace()),
            selector: Selector::new(policy.tick_interval(), policy.overdue_grace()),
            dispatcher: Dispatcher::new(channels, policy.recency_window()),
            connector,
            policy,
            flight: Mutex::new(()),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub fn channels(&self) -> &Channels {
        self.dispatcher.channels()
    }

    pub fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now())
    }

    /// Run one full cycle as of `now`.
    ///
    /// Only a failure to connect to the store is returned as an error; every
    /// later failure is isolated to its cleanup step or reminder and logged.
    pub fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let _flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = CycleReport::new(Utc::now());

        let store = self.connector.connect().map_err(|e| {
            tracing::error!("reminder cycle skipped: {e}");
            e
        })?;

        report.cleanup = self.cleaner.run(&store, now);

        let selection = match self.selector.candidates(&store, now) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("candidate query failed, nothing dispatched this tick: {e}");
                Selection::default()
            }
        };
        report.attempted = selection.candidates.len() + selection.undecodable;
        report.errored = selection.undecodable;

        for candidate in &selection.candidates {
            match self.dispatcher.dispatch(&store, candidate, now) {
                Ok(outcome) if outcome.fired() => report.succeeded += 1,
                Ok(DispatchOutcome::Failed) => report.failed += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(reminder_id = candidate.id(), "reminder not processed: {e}");
                    report.errored += 1;
                }
            }
        }
        drop(store);

        report.finished_at = Utc::now();
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            errored = report.errored,
            "{}",
            report.message()
        );

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.cycles_run += 1;
        state.last_report = Some(report.clone());
        Ok(report)
    }
}

impl<C: StoreConnector> CycleRunner for ReminderEngine<C> {
    fn trigger_once(&self) -> Result<CycleReport> {
        self.run_cycle()
    }

    fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        SchedulerStatus {
            tick_interval_secs: self.policy.tick_interval_secs,
            recency_window_secs: self.policy.recency_window_secs,
            cycles_run: state.cycles_run,
            channels: self.channels().enabled(),
            last_report: state.last_report.clone(),
        }
    }

    fn upcoming(&self, horizon: Duration) -> Result<Vec<ReminderWithTask>> {
        let store = self.connector.connect()?;
        store.upcoming_reminders(Utc::now(), horizon)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
