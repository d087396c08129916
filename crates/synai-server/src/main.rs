use std::sync::Arc;

use anyhow::{Context, Result};

use synai_server::{AppState, RelayConfig, logging, router};
use synai_wallet::WalletManager;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::from_env()?;
    logging::init_logging(&config)?;

    let wallets = Arc::new(WalletManager::from_master_secret(config.master_secret()));
    let state = AppState::from_config(&config, wallets)?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        state_dir = %config.state_dir.display(),
        persist = config.persist,
        "SYNAI relay listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
