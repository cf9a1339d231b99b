use std::sync::Arc;
use std::time::Duration;

use nudge_core::engine::CycleRunner;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Drive `runner` once per `period` until the returned handle is aborted.
///
/// Each cycle runs on the blocking pool and is awaited before the next tick,
/// so a slow cycle delays the schedule instead of stacking up behind it.
pub fn spawn_ticker(runner: Arc<dyn CycleRunner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("reminder ticker started, every {}s", period.as_secs());

        loop {
            interval.tick().await;
            let runner = runner.clone();
            match tokio::task::spawn_blocking(move || runner.trigger_once()).await {
                Ok(Ok(report)) => {
                    tracing::debug!(succeeded = report.succeeded, "tick finished");
                }
                // The engine already logged the store failure; the next tick retries.
                Ok(Err(_)) => {}
                Err(e) => tracing::error!("reminder cycle panicked: {e}"),
            }
        }
    })
}
