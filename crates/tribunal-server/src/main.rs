//! HTTP server entry point.
//!
//! Loads settings, connects every judge backend once, then serves the
//! evaluation API on `TRIBUNAL_ADDR` (default `0.0.0.0:8000`).

mod app;
mod error;
mod handlers;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use tribunal_config::Settings;
use tribunal_engine::JudgePanel;

use app::{router, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .compact()
        .init();

    let settings = Settings::load()?;
    let panel = JudgePanel::initialize(&settings).await;
    let state = Arc::new(ServerState::new(&panel, &settings));

    let app = router(state, &settings.server);

    let addr = settings.server.addr.as_str();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
