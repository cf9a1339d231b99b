use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Axum middleware for the guarded trigger.
///
/// Requires `Authorization: Bearer <CRON_SECRET>`. With no secret configured
/// every request is rejected.
pub async fn require_cron_secret(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let authorized = matches!(
        (app.cron_secret.as_deref(), presented),
        (Some(secret), Some(token)) if tokens_match(token, secret)
    );

    if authorized {
        next.run(req).await
    } else {
        tracing::warn!(path = %req.uri().path(), "rejected cron trigger: bad or missing bearer token");
        unauthorized()
    }
}

/// Constant-time over the bytes compared; a length mismatch is rejected.
fn tokens_match(presented: &str, secret: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(secret.as_bytes()))
}

fn unauthorized() -> Response {
    Response::builder()
        .status(401)
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"error":"unauthorized"}"#))
        .expect("infallible: all header values are valid ASCII")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{http::Request, middleware, routing::post, Router};
    use chrono::Duration;
    use nudge_core::engine::{CycleReport, CycleRunner, SchedulerStatus};
    use nudge_core::reminder::ReminderWithTask;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Idle;

    impl CycleRunner for Idle {
        fn trigger_once(&self) -> nudge_core::Result<CycleReport> {
            Err(nudge_core::NudgeError::StoreUnavailable("idle".into()))
        }

        fn status(&self) -> SchedulerStatus {
            SchedulerStatus {
                tick_interval_secs: 60,
                recency_window_secs: 3600,
                cycles_run: 0,
                channels: Vec::new(),
                last_report: None,
            }
        }

        fn upcoming(&self, _horizon: Duration) -> nudge_core::Result<Vec<ReminderWithTask>> {
            Ok(Vec::new())
        }
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn test_app(secret: Option<&str>) -> Router {
        let state = AppState::new(Arc::new(Idle), secret.map(str::to_string));
        Router::new()
            .route("/guarded", post(ok_handler))
            .route_layer(middleware::from_fn_with_state(state, require_cron_secret))
    }

    async fn call(app: Router, auth: Option<&str>) -> StatusCode {
        let mut req = Request::builder().method("POST").uri("/guarded");
        if let Some(value) = auth {
            req = req.header("authorization", value);
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn matching_bearer_passes_through() {
        let status = call(test_app(Some("s3cret")), Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_bearer_is_rejected() {
        let status = call(test_app(Some("s3cret")), Some("Bearer nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn near_miss_bearer_is_rejected() {
        // Same length, last byte differs.
        let status = call(test_app(Some("s3cret")), Some("Bearer s3creT")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let status = call(test_app(Some("s3cret")), Some("Bearer s3cre")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let status = call(test_app(Some("s3cret")), Some("Bearer s3cret2")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3creT", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
        assert!(!tokens_match("s3cret ", "s3cret"));
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        assert_eq!(call(test_app(Some("s3cret")), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let status = call(test_app(Some("s3cret")), Some("Basic s3cret")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unset_secret_rejects_everything() {
        assert_eq!(call(test_app(None), Some("Bearer ")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(test_app(Some("")), Some("Bearer ")).await, StatusCode::UNAUTHORIZED);
    }
}
