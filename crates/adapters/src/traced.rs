// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced store wrapper for consistent observability

use crate::store::{CounterStore, StoreError, StoreStats};
use async_trait::async_trait;
use std::time::Instant;
use tracing::Instrument;

/// Wrapper that adds tracing to any CounterStore
#[derive(Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TracedStore<S> {
    type Transaction = S::Transaction;

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(value) => tracing::trace!(key, ?value, elapsed_ms, "store.get"),
            Err(e) => tracing::error!(key, elapsed_ms, error = %e, "store.get failed"),
        }

        result
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.set", key, value);

        let start = Instant::now();
        let result = self.inner.set(key, value).instrument(span.clone()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        span.in_scope(|| match &result {
            Ok(()) => tracing::debug!(elapsed_ms, "written"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "write failed"),
        });

        result
    }

    async fn begin_optimistic(&self, key: &str) -> Result<Self::Transaction, StoreError> {
        let result = self.inner.begin_optimistic(key).await;
        if let Err(e) = &result {
            tracing::error!(key, error = %e, "store.begin_optimistic failed");
        }
        result
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.ping().await;
        tracing::debug!(
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.ping"
        );
        result
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let result = self.inner.stats().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "store.stats failed");
        }
        result
    }

    async fn close(&self) {
        tracing::info!("store.close");
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
