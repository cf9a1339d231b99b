use std::sync::Arc;

use nudge_core::engine::CycleRunner;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn CycleRunner>,
    /// Bearer token for the guarded trigger. `None` rejects every request.
    pub cron_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(runner: Arc<dyn CycleRunner>, cron_secret: Option<String>) -> Self {
        Self {
            runner,
            cron_secret: cron_secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}
