// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared key-value store adapters
//!
//! The counter lives in an external store that every node can reach. The
//! coordinator only needs plain reads and writes plus one optimistic
//! primitive: watch a key, then write only if nobody else touched it.

mod redis;

pub use self::redis::{RedisOptions, RedisStore, RedisTransaction};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStore, FakeTransaction, StoreCall};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Operational counters reported by the store, keyed by name
pub type StoreStats = BTreeMap<String, serde_json::Value>;

/// Errors from store operations
///
/// Every variant means the store could not be used. Contention is not an
/// error; it is reported as [`CommitOutcome::Conflict`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("timed out connecting to store after {0:?}")]
    Timeout(Duration),
    #[error("store connection closed")]
    Closed,
}

/// Result of a conditional commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All writes were applied atomically
    Committed,
    /// The watched key changed since the transaction began; nothing was written
    Conflict,
}

impl CommitOutcome {
    pub fn is_committed(self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// Adapter for the shared counter store
#[async_trait]
pub trait CounterStore: Clone + Send + Sync + 'static {
    /// Transaction handle returned by [`CounterStore::begin_optimistic`]
    type Transaction: StoreTransaction;

    /// Read a key, `None` if it was never set
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Unconditionally write a key
    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// Start watching `key` for a conditional write
    async fn begin_optimistic(&self, key: &str) -> Result<Self::Transaction, StoreError>;

    /// Check that the store answers
    async fn ping(&self) -> Result<(), StoreError>;

    /// Store-reported operational counters
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Release every connection held by this store
    async fn close(&self);
}

/// A single optimistic transaction against one watched key.
///
/// A transaction belongs to exactly one attempt. Dropping it without
/// committing applies nothing.
#[async_trait]
pub trait StoreTransaction: Send + 'static {
    /// Read a key inside the watched transaction
    async fn read(&mut self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Apply `writes` atomically, only if the watched key is unchanged
    async fn commit_if_unchanged(
        self,
        writes: &[(&str, i64)],
    ) -> Result<CommitOutcome, StoreError>;

    /// Abandon the transaction without writing
    async fn discard(self) -> Result<(), StoreError>;
}
