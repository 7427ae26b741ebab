//! Faultline binary entry point.
//!
//! Starts the fault ingestion and stats API (port 8700 by default).

use std::sync::Arc;

use faultline::{
    ingest::{fault_router_with_limit, IngestState},
    monitor::LogAlertSink,
    record::TracingSink,
    FaultService, FaultlineConfig,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faultline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting faultline");

    let config = FaultlineConfig::load()?;
    tracing::info!(
        bind_addr = %config.server.bind_addr,
        environment = ?config.environment,
        "Configuration loaded"
    );

    let service = Arc::new(FaultService::from_config(
        &config,
        Arc::new(TracingSink::new()),
        Arc::new(LogAlertSink::new()),
    ));

    for problem in service.layers().validate_rules() {
        tracing::warn!(%problem, "Layer rule configuration problem");
    }

    let router = fault_router_with_limit(IngestState::new(service), config.server.max_body_size);
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "Server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal future for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
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
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
