//! Filegate API Server
//!
//! Main entry point for the file gateway service.

mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use filegate_api::{AppState, HttpMetrics, create_router};
use filegate_core::storage::FileService;
use filegate_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    telemetry::init_telemetry(&config.telemetry)?;

    // One client for the whole process
    let files = Arc::new(FileService::from_config(&config.storage));
    info!(
        endpoint = %config.storage.endpoint,
        region = %config.storage.region,
        path_style = config.storage.force_path_style,
        "Object store client configured"
    );

    if config.storage.ensure_default_bucket
        && let Some(bucket) = config.storage.default_bucket.as_deref()
    {
        let state = files
            .ensure_bucket(bucket, &CancellationToken::new())
            .await
            .with_context(|| format!("Failed to ensure bucket {bucket}"))?;
        info!(bucket, ?state, "Default bucket ready");
    }

    let registry = Registry::new();
    let metrics = HttpMetrics::new(&registry).context("Failed to register metrics")?;

    // Create application state
    let state = AppState { files, metrics };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    telemetry::shutdown_telemetry();

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
