use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use nudge_core::channel::{Channels, Notice, Notifier, Rendered};
use nudge_core::config::EnginePolicy;
use nudge_core::engine::ReminderEngine;
use nudge_core::reminder::{NewReminder, Task};
use nudge_core::store::{SqliteConnector, StoreConnector};
use nudge_core::types::ChannelKind;
use nudge_server::{build_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Accept;

impl Notifier for Accept {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn render(&self, notice: &Notice) -> Rendered {
        Rendered {
            subject: notice.task_name.clone(),
            body: notice.urgency.to_string(),
        }
    }

    fn send(&self, _destination: &str, _subject: &str, _body: &str) -> bool {
        true
    }
}

fn setup(secret: Option<&str>) -> (TempDir, SqliteConnector, axum::Router) {
    let dir = TempDir::new().unwrap();
    let connector = SqliteConnector::open(&dir.path().join("nudge.db")).unwrap();
    let engine = ReminderEngine::new(
        connector.clone(),
        Channels::new().with(Accept),
        EnginePolicy::default(),
    );
    let state = AppState::new(Arc::new(engine), secret.map(str::to_string));
    (dir, connector, build_router(state))
}

/// Seed a reminder on a fresh task whose firing instant is `fire_at`.
fn seed(connector: &SqliteConnector, task_id: &str, fire_at: DateTime<Utc>) {
    let store = connector.connect().unwrap();
    store
        .upsert_task(&Task::new(task_id, "Lab Report", "Chemistry", fire_at + Duration::hours(2)))
        .unwrap();
    store.upsert_student(1, "Grace").unwrap();
    store
        .insert_reminder(
            &NewReminder {
                student_id: 1,
                task_id: task_id.into(),
                task_name: "Lab Report".into(),
                lead_hours: 2,
                frequency: 1,
                channel: ChannelKind::Email,
                destination: "grace@example.com".into(),
            },
            Utc::now() - Duration::days(1),
        )
        .unwrap();
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut req = axum::http::Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .oneshot(req.body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, None).await
}

// ---------------------------------------------------------------------------
// Trigger endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn periodic_trigger_with_nothing_due() {
    let (_dir, _connector, app) = setup(None);
    let (status, body) = get(app, "/api/cron/process-reminders").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 0);
    assert_eq!(body["total"], 0);
    assert_eq!(
        body["message"],
        "No reminders due at this time (checked 0 active reminders)"
    );
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn manual_trigger_sends_due_reminder_once() {
    let (_dir, connector, app) = setup(None);
    seed(&connector, "T1", Utc::now() - Duration::seconds(5));

    let (status, body) = post(app.clone(), "/api/cron/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["total"], 1);
    assert_eq!(body["message"], "Successfully processed 1 out of 1 reminders");

    let (_, again) = post(app, "/api/cron/trigger").await;
    assert_eq!(again["processed"], 0);
}

#[tokio::test]
async fn guarded_trigger_requires_bearer() {
    let (_dir, _connector, app) = setup(Some("cron-s3cret"));

    let (status, body) = send(app.clone(), "POST", "/api/cron/reminders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(app.clone(), "POST", "/api/cron/reminders", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(app, "POST", "/api/cron/reminders", Some("cron-s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn guarded_trigger_without_configured_secret_rejects() {
    let (_dir, _connector, app) = setup(None);
    let (status, _) = send(app, "POST", "/api/cron/reminders", Some("anything")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unguarded_routes_ignore_authorization() {
    let (_dir, _connector, app) = setup(Some("cron-s3cret"));
    let (status, _) = get(app, "/api/cron/process-reminders").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_database_returns_503() {
    let (dir, _connector, app) = setup(None);
    std::fs::remove_file(dir.path().join("nudge.db")).unwrap();

    let (status, body) = get(app, "/api/cron/process-reminders").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("store unavailable"));
}

// ---------------------------------------------------------------------------
// Status and upcoming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_counts_cycles() {
    let (_dir, _connector, app) = setup(None);

    let (_, before) = get(app.clone(), "/api/cron/status").await;
    assert_eq!(before["cycles_run"], 0);
    assert_eq!(before["tick_interval_secs"], 60);
    assert!(before["last_report"].is_null());

    post(app.clone(), "/api/cron/trigger").await;

    let (status, after) = get(app, "/api/cron/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["cycles_run"], 1);
    assert_eq!(after["channels"], serde_json::json!(["email"]));
    assert_eq!(after["last_report"]["attempted"], 0);
}

#[tokio::test]
async fn upcoming_respects_horizon() {
    let (_dir, connector, app) = setup(None);
    seed(&connector, "T1", Utc::now() + Duration::minutes(30));

    let (status, body) = get(app.clone(), "/api/reminders/upcoming").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minutes"], 60);
    assert_eq!(body["count"], 1);
    assert_eq!(body["reminders"][0]["reminder"]["task_name"], "Lab Report");
    assert_eq!(body["reminders"][0]["student_name"], "Grace");
    assert!(body["reminders"][0]["fire_at"].is_string());

    let (_, narrow) = get(app, "/api/reminders/upcoming?minutes=10").await;
    assert_eq!(narrow["count"], 0);
}
