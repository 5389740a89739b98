// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the counter coordinator

use abacus_adapters::StoreError;
use thiserror::Error;

/// Errors surfaced by counter operations
///
/// Commit conflicts never appear here: they are retried, and only turn into
/// [`CounterError::ContentionExhausted`] once the attempt budget is spent.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("gave up after {attempts} conflicting commit attempts")]
    ContentionExhausted { attempts: u32 },
    #[error("adding {delta} to {current} overflows")]
    Overflow { current: i64, delta: i64 },
}

impl CounterError {
    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            CounterError::StoreUnavailable(_) => "store_unavailable",
            CounterError::ContentionExhausted { .. } => "contention_exhausted",
            CounterError::Overflow { .. } => "overflow",
        }
    }
}
