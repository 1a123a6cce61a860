//! Snowgate: HTTP server entry point.

use anyhow::Context;
use sg_server::config::Config;
use sg_server::router;
use sg_server::state::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let state = Arc::new(AppState::from_config(&config).await);
    let app = router(state, &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "snowgate listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
