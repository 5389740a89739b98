// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use abacus_adapters::{CounterStore, RedisStore, StoreError, TracedStore};
use abacus_engine::{Coordinator, CounterError, Sleeper, TokioSleeper};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::server::AppState;

/// Store used in production, wrapped with tracing
pub type DaemonStore = TracedStore<RedisStore>;

/// Running daemon: configuration plus the one coordinator every request shares
pub struct Daemon<S, Z> {
    pub config: Config,
    pub coordinator: Arc<Coordinator<S, Z>>,
    /// When daemon started
    pub start_time: Instant,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to store at {url}: {source}")]
    StoreConnect {
        url: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to initialize counter: {0}")]
    Bootstrap(#[from] CounterError),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Could not determine log directory")]
    NoLogDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect to Redis and start the daemon
///
/// Failing to reach the store is fatal: the daemon never serves without one.
pub async fn startup(config: &Config) -> Result<Daemon<DaemonStore, TokioSleeper>, LifecycleError> {
    config.validate()?;

    let options = config.redis.options();
    let url = options.url();
    let store = RedisStore::connect(options)
        .await
        .map_err(|source| LifecycleError::StoreConnect {
            url: url.clone(),
            source,
        })?;
    info!("Connected to Redis at {}", url);

    start_with(config.clone(), TracedStore::new(store), TokioSleeper, &url).await
}

/// Start the daemon on an already constructed store
pub async fn start_with<S, Z>(
    config: Config,
    store: S,
    sleeper: Z,
    store_url: &str,
) -> Result<Daemon<S, Z>, LifecycleError>
where
    S: CounterStore,
    Z: Sleeper,
{
    store
        .ping()
        .await
        .map_err(|source| LifecycleError::StoreConnect {
            url: store_url.to_string(),
            source,
        })?;

    let coordinator = Arc::new(Coordinator::new(store, sleeper, config.counter.clone()));

    match coordinator.bootstrap().await {
        Ok(true) => info!(key = %config.counter.key, "Initialized counter"),
        Ok(false) => info!(key = %config.counter.key, "Counter already present"),
        Err(e) => {
            coordinator.shutdown().await;
            return Err(e.into());
        }
    }

    Ok(Daemon {
        config,
        coordinator,
        start_time: Instant::now(),
    })
}

impl<S, Z> Daemon<S, Z>
where
    S: CounterStore,
    Z: Sleeper,
{
    /// Handler state sharing this daemon's coordinator
    pub fn app_state(&self) -> AppState<S, Z> {
        AppState::new(Arc::clone(&self.coordinator), self.config.node_id.as_str())
    }

    /// Shutdown the daemon gracefully
    ///
    /// The coordinator keeps no state of its own, so releasing the store
    /// connection is all there is to do.
    pub async fn shutdown(&self) {
        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Shutting down daemon..."
        );
        if Arc::strong_count(&self.coordinator) > 1 {
            warn!("Requests still hold the coordinator during shutdown");
        }
        self.coordinator.shutdown().await;
        info!("Daemon shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
