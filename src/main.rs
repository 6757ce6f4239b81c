use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use poolsettle::config::Config;
use poolsettle::scheduler::RandomExtremes;
use poolsettle::state::AppState;
use poolsettle::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let store = Store::connect(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout,
    )
    .await
    .with_context(|| format!("failed to open store at {}", config.database_url))?;

    let ledger = poolsettle::eth::from_config(&config).context("failed to set up ledger verifier")?;
    tracing::info!(mode = ?config.ledger_mode, "ledger verifier ready");

    let state = AppState::new(store, &config, Arc::from(ledger), Arc::new(RandomExtremes));

    if config.resolver_enabled {
        state.scheduler.start();
    } else {
        tracing::info!("resolution scheduler disabled");
    }

    let scheduler = state.scheduler.clone();
    let app = poolsettle::app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("Server running on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // lets an in-flight sweep finish before exiting
    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
