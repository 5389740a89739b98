// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abacus Daemon (abacusd)
//!
//! Serves the shared counter over HTTP until SIGINT or SIGTERM.

use abacus_daemon::config::{config_path, Config, CONFIG_ENV};
use abacus_daemon::{lifecycle, server, LifecycleError};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let path = config_path(&args, std::env::var(CONFIG_ENV).ok());

    // Load configuration
    let config = Config::load(path.as_deref())?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!(node_id = %config.node_id, "Starting abacusd");

    // Connect to the store and bootstrap the counter
    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let addr = config.listen_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            daemon.shutdown().await;
            drop(log_guard);
            return Err(LifecycleError::BindFailed(addr, e).into());
        }
    };

    info!("Daemon ready, listening on {}", addr);

    if let Err(e) = server::serve(listener, daemon.app_state(), shutdown_signal()).await {
        error!("Server error: {}", e);
    }

    daemon.shutdown().await;
    info!("Daemon stopped");
    Ok(())
}

/// Resolves on SIGTERM or SIGINT
async fn shutdown_signal() {
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            }
        }
        _ => {
            warn!("Could not install signal handlers, falling back to ctrl-c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for ctrl-c: {}", e);
            }
        }
    }
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = match &config.log_path {
        Some(log_path) => {
            // Create log directory if needed
            let dir = log_path.parent().ok_or(LifecycleError::NoLogDir)?;
            std::fs::create_dir_all(dir)?;

            let file_appender = tracing_appender::rolling::never(
                dir,
                log_path.file_name().ok_or(LifecycleError::NoLogDir)?,
            );
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
