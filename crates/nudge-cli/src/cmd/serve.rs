use crate::context::Context;
use anyhow::Result;
use nudge_core::engine::CycleRunner;
use nudge_server::AppState;
use std::sync::Arc;

pub fn run(ctx: &Context, port: u16, ticker: bool, cron_secret: Option<String>) -> Result<()> {
    // Built before the runtime: channels hold blocking clients that must not
    // be created or dropped on an async worker.
    let engine = ctx.engine()?;
    let period = std::time::Duration::from_secs(engine.policy().tick_interval_secs);
    let enabled = engine.channels().enabled();
    let runner: Arc<dyn CycleRunner> = Arc::new(engine);

    if enabled.is_empty() {
        tracing::warn!("no notification channel is configured; every attempt will be logged as failed");
    }
    if cron_secret.as_deref().unwrap_or_default().is_empty() {
        tracing::warn!("CRON_SECRET is not set; POST /api/cron/reminders will reject every request");
    }

    let rt = tokio::runtime::Runtime::new()?;
    let state = AppState::new(runner.clone(), cron_secret);

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("nudge listening on http://localhost:{actual_port}  (db {})", ctx.db.display());

        let ticker = ticker.then(|| nudge_server::spawn_ticker(state.runner.clone(), period));

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        };
        let result = nudge_server::serve_on(listener, state, shutdown).await;

        if let Some(handle) = ticker {
            handle.abort();
        }
        result
    })
}
