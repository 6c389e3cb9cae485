use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use linkshrink_gateway::telemetry::init_tracing;
use linkshrink_gateway::{App, AppState, Cli};
use linkshrink_shortener::ShortenerService;
use linkshrink_storage::Backend;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    init_tracing(config.log_format)?;

    let storage = config.storage_config()?;
    info!(
        address = %config.address,
        base_url = %config.base_url,
        storage_backend = %storage.kind(),
        "starting linkshrink server"
    );

    let backend = Backend::open(&storage)
        .await
        .context("failed to open storage backend")?;
    let shortener = ShortenerService::new(backend);
    let state = AppState::new(Arc::new(shortener), config.base_url);

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("failed to bind {}", config.address))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
