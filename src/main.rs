//! AI Playground Server
//!
//! Hosts the fan-out streaming engine behind a small HTTP service

use aiplayground::config::{AppConfig, Settings};
use aiplayground::utils::logging::init_logging;
use aiplayground::{create_router, version_info};
use anyhow::{Context, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment settings first, they carry the log configuration
    let settings = Settings::new().context("Failed to load server settings")?;
    init_logging(&settings.logging)?;

    info!("{}", version_info());

    // Provider configuration from JSON file (required)
    let app_config = AppConfig::load_default().context("Failed to load provider configuration")?;
    info!(
        "Provider configuration loaded: {} providers, {} models",
        app_config.providers.len(),
        app_config.list_model_keys().len()
    );

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let app = create_router(settings, app_config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("AI Playground server started on http://{}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Dispatch endpoint: http://{}/v1/dispatch", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
