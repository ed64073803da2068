//! pairbroker - session broker for app/tester test connections.
//!
//! Listens for WebSocket connections, pairs app and tester sockets that log
//! in with the same session id, and relays actions between them until either
//! side disconnects.

use clap::Parser as ClapParser;
use pairbroker::{
    api,
    config::{self, BrokerConfig, ConfigError},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pairbroker - pairs test runners with the apps they drive
#[derive(ClapParser, Debug)]
#[command(name = "pairbroker", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to the user config directory)
    #[arg(long, env = "PAIRBROKER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the WebSocket listener (overrides the config file)
    #[arg(long, env = "PAIRBROKER_BIND")]
    bind: Option<SocketAddr>,

    /// Maximum concurrent connections (overrides the config file)
    #[arg(long)]
    max_connections: Option<usize>,
}

#[derive(Debug, Error)]
enum BrokerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn load_config(cli: &Cli) -> Result<BrokerConfig, ConfigError> {
    let mut config = match cli.config.clone().or_else(config::default_config_path) {
        Some(path) => BrokerConfig::load_or_default(&path)?,
        None => BrokerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(max) = cli.max_connections {
        config.max_connections = max;
    }
    Ok(config)
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BrokerError> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(config.log_filter());

    run_server(config).await
}

async fn run_server(config: BrokerConfig) -> Result<(), BrokerError> {
    let bind = config.bind;
    let state = api::AppState::new(config);
    let shutdown = state.shutdown.clone();
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "pairbroker listening");

    let (server_shutdown_tx, server_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            server_shutdown_rx.await.ok();
        })
        .await
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(?e, "failed to listen for Ctrl+C, shutting down");
    } else {
        tracing::info!("received Ctrl+C");
    }

    // Let socket tasks send their close frames before the listener stops.
    shutdown.shutdown();
    if !shutdown.wait_for_drain(Duration::from_secs(2)).await {
        tracing::warn!(
            remaining = shutdown.active_count(),
            "sockets still open after drain timeout"
        );
    }
    let _ = server_shutdown_tx.send(());

    match http_handle.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!(?e, "HTTP server task panicked"),
    }

    tracing::info!("pairbroker exiting");
    Ok(())
}
