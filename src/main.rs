use std::net::SocketAddr;

use anyhow::Context;
use bird_watcher_proxy::{router, Config, ProxyState};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignored silently if missing)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bird_watcher_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("Starting Bird Watcher proxy");
    info!("Listening on: {}", config.addr());
    info!("Local backend: {}", config.local_api_base);
    info!("Remote backend: {}", config.remote_api_base);
    info!("  Prefer https (remote): {}", config.prefer_https);
    info!("  Request timeout: {} seconds", config.request_timeout_seconds);
    info!("  Max upload: {} MB", config.max_upload_mb);

    let state = ProxyState::from_config(&config).context("Failed to build HTTP client")?;
    let app = router(state, config.max_upload_bytes());

    let addr: SocketAddr = config.addr().parse().context("Invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Bird Watcher proxy is ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping");
}
