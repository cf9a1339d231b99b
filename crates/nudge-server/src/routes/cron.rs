use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use nudge_core::engine::{CycleReport, SchedulerStatus};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// Body returned by every trigger endpoint.
#[derive(Debug, Serialize)]
pub struct CycleResponse {
    pub success: bool,
    pub message: String,
    pub processed: usize,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

impl From<CycleReport> for CycleResponse {
    fn from(report: CycleReport) -> Self {
        Self {
            success: true,
            message: report.message(),
            processed: report.succeeded,
            total: report.attempted,
            timestamp: report.finished_at,
        }
    }
}

async fn run_cycle(app: AppState) -> Result<Json<CycleResponse>, AppError> {
    let runner = app.runner.clone();
    let report = tokio::task::spawn_blocking(move || runner.trigger_once())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("cycle join error: {e}")))??;
    Ok(Json(report.into()))
}

/// GET /api/cron/process-reminders: periodic trigger from an external scheduler.
pub async fn process_reminders(State(app): State<AppState>) -> Result<Json<CycleResponse>, AppError> {
    run_cycle(app).await
}

/// POST /api/cron/trigger: manual trigger.
pub async fn trigger(State(app): State<AppState>) -> Result<Json<CycleResponse>, AppError> {
    tracing::info!("manual reminder cycle requested");
    run_cycle(app).await
}

/// POST /api/cron/reminders: same cycle, behind the bearer-token guard.
pub async fn guarded_trigger(State(app): State<AppState>) -> Result<Json<CycleResponse>, AppError> {
    run_cycle(app).await
}

/// GET /api/cron/status
pub async fn status(State(app): State<AppState>) -> Json<SchedulerStatus> {
    Json(app.runner.status())
}
