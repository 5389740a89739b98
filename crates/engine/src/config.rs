// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Key the counter lives under unless configured otherwise
pub const DEFAULT_KEY: &str = "abacus:sum";

/// Tuning for the increment protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CounterConfig {
    /// Store key holding the counter
    pub key: String,
    /// Pause after a conflicting commit before the next attempt
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Commit attempts a single `add` may use
    pub max_attempts: u32,
    /// Value written when the key is absent at startup
    pub initial_value: i64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            retry_delay: Duration::from_millis(10),
            max_attempts: 100,
            initial_value: 0,
        }
    }
}

impl CounterConfig {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_value(mut self, value: i64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.key.trim().is_empty() {
            return Err(InvalidConfig::EmptyKey);
        }
        if self.max_attempts == 0 {
            return Err(InvalidConfig::NoAttempts);
        }
        Ok(())
    }
}

/// Rejected counter configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("counter key must not be empty")]
    EmptyKey,
    #[error("max_attempts must be at least 1")]
    NoAttempts,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
