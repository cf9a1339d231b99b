pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ticker;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;
pub use ticker::spawn_ticker;

/// Build the axum Router with all trigger routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guarded = Router::new()
        .route("/api/cron/reminders", post(routes::cron::guarded_trigger))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_cron_secret,
        ));

    Router::new()
        .route(
            "/api/cron/process-reminders",
            get(routes::cron::process_reminders),
        )
        .route("/api/cron/trigger", post(routes::cron::trigger))
        .route("/api/cron/status", get(routes::cron::status))
        .route("/api/reminders/upcoming", get(routes::reminders::upcoming))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the trigger surface on a pre-bound listener until `shutdown` resolves.
///
/// Accepting a bound listener lets the caller read the actual port first
/// (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(state);

    tracing::info!("nudge trigger surface listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
