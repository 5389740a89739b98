// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Abacus daemon: HTTP facade and process lifecycle around the counter
//! coordinator.

pub mod config;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use config::{Config, ConfigError, RedisConfig};
pub use lifecycle::{start_with, startup, Daemon, DaemonStore, LifecycleError};
pub use server::{router, serve, ApiError, AppState};
