use anyhow::{Context, Result};
use dotenvy::dotenv;
use slap::config::database::init_db_pool;
use slap::config::server::ServerConfig;
use slap::logging::init_tracing;
use slap::metrics::init_metrics;
use slap::router::init_router;
use slap::state::AppState;
use slap_cache::{Slap, SlapOptions};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing()?;

    let options = SlapOptions::from_env().context("Invalid cache options")?;
    let cache = Slap::connect(options)
        .await
        .context("Failed to connect to the cache store")?;

    let db = init_db_pool().await?;
    let metrics = init_metrics()?;

    let state = AppState::new(db, cache.clone());
    let app = init_router(state, metrics);

    let config = ServerConfig::from_env();
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    info!(addr = %config.addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cache.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
