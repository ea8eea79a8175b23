//! # ire-api — Binary Entry Point
//!
//! Reads configuration from the environment, loads the rule file, starts
//! the escalation sweep and the notification dispatcher, and serves HTTP
//! until Ctrl-C.

use ire_api::config::{AppConfig, LogFormat};
use ire_api::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(?config, "configuration loaded");

    let prometheus = ire_api::metrics::install_recorder().map_err(|e| {
        tracing::error!("Prometheus recorder installation failed: {e}");
        e
    })?;

    let state = AppState::bootstrap(config)
        .map_err(|e| {
            tracing::error!("Bootstrap failed: {e}");
            e
        })?
        .with_prometheus(prometheus);

    let sweeper = ire_api::monitor_task::spawn(state.clone());
    let port = state.config.port;
    let app = ire_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("incident routing API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
