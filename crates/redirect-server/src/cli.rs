//! CLI module for redirect-server.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use redirect_core::logging::init_tracing;

use crate::config::{build_registry, load_config};
use crate::listener;

/// Redirect server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "redirect-server",
    version,
    about = "Channel-based TCP relay server"
)]
pub struct ServerArgs {
    /// Config file path (toml).
    #[arg(short, long, default_value = "server.toml")]
    pub config: PathBuf,

    /// Override listen address.
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Log level override.
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Run the redirect server with the given CLI arguments.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;

    if let Some(listen) = &args.listen {
        config.server.listen = listen.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = Some(level.clone());
    }

    init_tracing(&config.logging);

    let registry = build_registry(&config.targets)?;
    info!(channels = registry.len(), "channel registry loaded");

    // Graceful shutdown on SIGTERM/SIGINT.
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    listener::run(config, registry, shutdown).await?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
pub(crate) async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
