//! Dropshelf reverse proxy binary.

use dropshelf_domain::{DropshelfError, Result};
use dropshelf_proxy::{ProxyConfig, ProxyServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ProxyConfig::from_env()?;
    tracing::info!(backend = %config.backend_url, addr = %config.bind_addr, "starting proxy");

    let server = ProxyServer::start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DropshelfError::Internal(format!("Failed to listen for shutdown: {e}")))?;
    tracing::info!("shutdown signal received");
    server.shutdown().await?;

    Ok(())
}
