// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter coordinator
//!
//! Increments run as an optimistic read-modify-write loop: watch the key,
//! read it, write `value + delta` only if nobody else wrote in between, and
//! retry after a short pause when somebody did. The store's conditional
//! commit is the only serialization point; nothing here takes a lock.

use crate::config::CounterConfig;
use crate::error::CounterError;
use crate::sleep::Sleeper;
use abacus_adapters::{CommitOutcome, CounterStore, StoreStats, StoreTransaction};

/// Coordinates reads and writes of the shared counter
///
/// Holds no counter state of its own. Cheap to share behind an `Arc`; every
/// `add` opens its own transaction.
pub struct Coordinator<S, Z> {
    store: S,
    sleeper: Z,
    config: CounterConfig,
}

impl<S, Z> Coordinator<S, Z>
where
    S: CounterStore,
    Z: Sleeper,
{
    pub fn new(store: S, sleeper: Z, config: CounterConfig) -> Self {
        Self {
            store,
            sleeper,
            config,
        }
    }

    /// Write the initial value if the key is absent
    ///
    /// Never overwrites an existing value, including one written by another
    /// node between our read and our write. Returns whether it wrote.
    pub async fn bootstrap(&self) -> Result<bool, CounterError> {
        let key = self.config.key.as_str();
        if self.store.get(key).await?.is_some() {
            tracing::debug!(key, "counter already present");
            return Ok(false);
        }

        let mut txn = self.store.begin_optimistic(key).await?;
        if txn.read(key).await?.is_some() {
            txn.discard().await?;
            return Ok(false);
        }

        let initial = self.config.initial_value;
        match txn.commit_if_unchanged(&[(key, initial)]).await? {
            CommitOutcome::Committed => {
                tracing::info!(key, initial, "initialized counter");
                Ok(true)
            }
            // Another node created it first
            CommitOutcome::Conflict => Ok(false),
        }
    }

    /// Add `delta` to the counter and return the new value
    pub async fn add(&self, delta: i64) -> Result<i64, CounterError> {
        let key = self.config.key.as_str();
        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        while attempt < max_attempts {
            let mut txn = self.store.begin_optimistic(key).await?;
            let current = txn.read(key).await?.unwrap_or(0);
            let new_value = current
                .checked_add(delta)
                .ok_or(CounterError::Overflow { current, delta })?;

            match txn.commit_if_unchanged(&[(key, new_value)]).await? {
                CommitOutcome::Committed => {
                    tracing::info!(delta, new_value, attempts = attempt + 1, "added to counter");
                    return Ok(new_value);
                }
                CommitOutcome::Conflict => {
                    attempt += 1;
                    tracing::debug!(attempt, max_attempts, "commit conflict, retrying");
                    if attempt < max_attempts {
                        self.sleeper.sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        tracing::warn!(delta, attempts = max_attempts, "contention exhausted retry budget");
        Err(CounterError::ContentionExhausted {
            attempts: max_attempts,
        })
    }

    /// Current counter value, 0 if absent
    pub async fn get(&self) -> Result<i64, CounterError> {
        Ok(self.store.get(&self.config.key).await?.unwrap_or(0))
    }

    /// Overwrite the counter with 0
    ///
    /// Unguarded: an `add` racing a reset may land before or after it.
    pub async fn reset(&self) -> Result<(), CounterError> {
        self.store.set(&self.config.key, 0).await?;
        tracing::info!(key = %self.config.key, "counter reset");
        Ok(())
    }

    /// Store operational counters; empty when the store cannot report
    pub async fn stats(&self) -> StoreStats {
        match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "failed to collect store stats");
                StoreStats::new()
            }
        }
    }

    /// Release the store connection
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
