use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use nudge_core::reminder::ReminderWithTask;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_HORIZON_MINUTES: u32 = 60;

#[derive(Debug, Deserialize)]
pub struct UpcomingParams {
    pub minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UpcomingEntry {
    pub fire_at: DateTime<Utc>,
    #[serde(flatten)]
    pub reminder: ReminderWithTask,
}

#[derive(Debug, Serialize)]
pub struct UpcomingResponse {
    pub success: bool,
    pub minutes: u32,
    pub count: usize,
    pub reminders: Vec<UpcomingEntry>,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/reminders/upcoming?minutes=N: reminders that will fire soon.
pub async fn upcoming(
    State(app): State<AppState>,
    Query(params): Query<UpcomingParams>,
) -> Result<Json<UpcomingResponse>, AppError> {
    let minutes = params.minutes.unwrap_or(DEFAULT_HORIZON_MINUTES);
    let runner = app.runner.clone();
    let found = tokio::task::spawn_blocking(move || {
        runner.upcoming(Duration::minutes(i64::from(minutes)))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("upcoming join error: {e}")))??;

    let reminders: Vec<UpcomingEntry> = found
        .into_iter()
        .map(|reminder| UpcomingEntry {
            fire_at: reminder.fire_at(),
            reminder,
        })
        .collect();

    Ok(Json(UpcomingResponse {
        success: true,
        minutes,
        count: reminders.len(),
        reminders,
        timestamp: Utc::now(),
    }))
}
