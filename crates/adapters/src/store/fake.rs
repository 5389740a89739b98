// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake counter store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CommitOutcome, CounterStore, StoreError, StoreStats, StoreTransaction};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { key: String },
    Set { key: String, value: i64 },
    Begin { key: String },
    Read { key: String },
    Commit { writes: Vec<(String, i64)> },
    Discard,
    Ping,
    Stats,
    Close,
}

/// Simulated concurrent writers hitting the watched key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interference {
    None,
    Next(usize),
    Always,
}

#[derive(Debug)]
struct Entry {
    value: i64,
    version: u64,
}

#[derive(Debug)]
struct FakeState {
    entries: HashMap<String, Entry>,
    next_version: u64,
    unavailable: bool,
    closed: bool,
    interference: Interference,
    stats: StoreStats,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_version: 1,
            unavailable: false,
            closed: false,
            interference: Interference::None,
            stats: StoreStats::new(),
        }
    }
}

impl FakeState {
    fn check(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    // Absent keys have version 0
    fn version(&self, key: &str) -> u64 {
        self.entries.get(key).map(|e| e.version).unwrap_or(0)
    }

    fn write(&mut self, key: &str, value: i64) {
        let version = self.next_version;
        self.next_version += 1;
        self.entries
            .insert(key.to_string(), Entry { value, version });
    }

    /// Touch the key the way another client would, bumping its version
    fn interfere(&mut self, key: &str) -> bool {
        let fire = match self.interference {
            Interference::None => false,
            Interference::Always => true,
            Interference::Next(0) => false,
            Interference::Next(n) => {
                self.interference = Interference::Next(n - 1);
                true
            }
        };
        if fire {
            let value = self.entries.get(key).map(|e| e.value).unwrap_or(0);
            self.write(key, value);
        }
        fire
    }
}

/// Fake counter store for testing
///
/// Keys carry a version that every write bumps, which is how conflicts are
/// detected. Clones share state, so a clone can play a second node.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Count recorded calls matching a predicate
    pub fn count_calls(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Current value, bypassing call recording and availability
    pub fn value(&self, key: &str) -> Option<i64> {
        self.state().entries.get(key).map(|e| e.value)
    }

    /// Seed a value, bypassing call recording and availability
    pub fn insert(&self, key: &str, value: i64) {
        self.state().write(key, value);
    }

    /// Make every call fail as if the connection were severed
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Make the next `n` commits see a concurrent write to their key
    pub fn conflict_next(&self, n: usize) {
        self.state().interference = Interference::Next(n);
    }

    /// Make every commit see a concurrent write to its key
    pub fn conflict_always(&self) {
        self.state().interference = Interference::Always;
    }

    /// Stop injecting conflicts
    pub fn clear_conflicts(&self) {
        self.state().interference = Interference::None;
    }

    /// Set the operational counters reported by `stats`
    pub fn set_stats(&self, stats: StoreStats) {
        self.state().stats = stats;
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl CounterStore for FakeStore {
    type Transaction = FakeTransaction;

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.record(StoreCall::Get {
            key: key.to_string(),
        });
        let state = self.state();
        state.check()?;
        Ok(state.entries.get(key).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.record(StoreCall::Set {
            key: key.to_string(),
            value,
        });
        let mut state = self.state();
        state.check()?;
        state.write(key, value);
        Ok(())
    }

    async fn begin_optimistic(&self, key: &str) -> Result<FakeTransaction, StoreError> {
        self.record(StoreCall::Begin {
            key: key.to_string(),
        });
        let watched_version = {
            let state = self.state();
            state.check()?;
            state.version(key)
        };
        Ok(FakeTransaction {
            store: self.clone(),
            key: key.to_string(),
            watched_version,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.record(StoreCall::Ping);
        self.state().check()
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.record(StoreCall::Stats);
        let state = self.state();
        state.check()?;
        Ok(state.stats.clone())
    }

    async fn close(&self) {
        self.record(StoreCall::Close);
        self.state().closed = true;
    }
}

/// Fake optimistic transaction watching one key
pub struct FakeTransaction {
    store: FakeStore,
    key: String,
    watched_version: u64,
}

impl FakeTransaction {
    pub fn watched_key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl StoreTransaction for FakeTransaction {
    async fn read(&mut self, key: &str) -> Result<Option<i64>, StoreError> {
        self.store.record(StoreCall::Read {
            key: key.to_string(),
        });
        // A network round trip: let other tasks run between read and commit
        tokio::task::yield_now().await;
        let state = self.store.state();
        state.check()?;
        Ok(state.entries.get(key).map(|e| e.value))
    }

    async fn commit_if_unchanged(
        self,
        writes: &[(&str, i64)],
    ) -> Result<CommitOutcome, StoreError> {
        self.store.record(StoreCall::Commit {
            writes: writes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        });
        let mut state = self.store.state();
        state.check()?;
        state.interfere(&self.key);

        if state.version(&self.key) != self.watched_version {
            return Ok(CommitOutcome::Conflict);
        }
        for (key, value) in writes {
            state.write(key, *value);
        }
        Ok(CommitOutcome::Committed)
    }

    async fn discard(self) -> Result<(), StoreError> {
        self.store.record(StoreCall::Discard);
        self.store.state().check()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
