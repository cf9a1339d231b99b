//! The reminder processing pipeline.
//!
//! Each cycle runs the [`Cleaner`], then the [`Selector`], then hands every
//! candidate to the [`Dispatcher`]. [`ReminderEngine`] owns the sequence and
//! serializes cycles.

pub mod cleaner;
pub mod dispatch;
pub mod scheduler;
pub mod selector;

pub use cleaner::{Cleaner, CleanupReport};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use scheduler::{CycleReport, CycleRunner, ReminderEngine, SchedulerStatus};
pub use selector::{Selection, Selector};
