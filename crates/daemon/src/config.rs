// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Sources, later wins: built-in defaults, an optional TOML file, then
//! environment variables.

use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use abacus_adapters::RedisOptions;
use abacus_engine::{CounterConfig, InvalidConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file when no argument is given
pub const CONFIG_ENV: &str = "ABACUS_CONFIG";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Identifier reported in every response
    pub node_id: String,
    /// Log file; stdout when unset
    pub log_path: Option<PathBuf>,
    pub redis: RedisConfig,
    pub counter: CounterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            node_id: format!("node-{}", std::process::id()),
            log_path: None,
            redis: RedisConfig::default(),
            counter: CounterConfig::default(),
        }
    }
}

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Background PING interval; zero disables it
    #[serde(with = "humantime_serde")]
    pub keepalive: Duration,
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        let options = RedisOptions::default();
        Self {
            host: options.host,
            port: options.port,
            db: options.db,
            connect_timeout: options.connect_timeout,
            keepalive: options.keepalive.unwrap_or(Duration::ZERO),
            pool_size: options.pool_size,
        }
    }
}

impl RedisConfig {
    pub fn options(&self) -> RedisOptions {
        RedisOptions {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            connect_timeout: self.connect_timeout,
            keepalive: (!self.keepalive.is_zero()).then_some(self.keepalive),
            pool_size: self.pool_size,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Env {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid counter config: {0}")]
    Counter(#[from] InvalidConfig),
}

impl Config {
    /// Load from an optional file, apply the process environment, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Ok(toml::from_str(&text)?)
    }

    /// Override fields from environment variables
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("PORT") {
            self.port = parse_env("PORT", v)?;
        }
        if let Some(v) = lookup("NODE_ID") {
            self.node_id = v;
        }
        if let Some(v) = lookup("REDIS_HOST") {
            self.redis.host = v;
        }
        if let Some(v) = lookup("REDIS_PORT") {
            self.redis.port = parse_env("REDIS_PORT", v)?;
        }
        if let Some(v) = lookup("REDIS_DB") {
            self.redis.db = parse_env("REDIS_DB", v)?;
        }
        if let Some(v) = lookup("ABACUS_COUNTER_KEY") {
            self.counter.key = v;
        }
        if let Some(v) = lookup("ABACUS_RETRY_DELAY") {
            self.counter.retry_delay =
                humantime::parse_duration(&v).map_err(|e| ConfigError::Env {
                    name: "ABACUS_RETRY_DELAY",
                    value: v.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(v) = lookup("ABACUS_MAX_ATTEMPTS") {
            self.counter.max_attempts = parse_env("ABACUS_MAX_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("ABACUS_LOG") {
            self.log_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node_id must not be empty".to_string()));
        }
        if self.redis.host.trim().is_empty() {
            return Err(ConfigError::Invalid("redis.host must not be empty".to_string()));
        }
        if self.redis.db < 0 {
            return Err(ConfigError::Invalid(format!(
                "redis.db must not be negative, got {}",
                self.redis.db
            )));
        }
        if self.redis.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "redis.connect_timeout must be positive".to_string(),
            ));
        }
        if self.redis.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "redis.pool_size must be at least 1".to_string(),
            ));
        }
        self.counter.validate()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Config file path: first argument, else `ABACUS_CONFIG`
pub fn config_path(args: &[String], env: Option<String>) -> Option<PathBuf> {
    args.get(1).cloned().or(env).map(PathBuf::from)
}

fn parse_env<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        name,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
