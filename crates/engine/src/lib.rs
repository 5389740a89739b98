// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Abacus counter engine: the optimistic increment protocol

mod config;
mod coordinator;
mod error;
pub mod sleep;

pub use config::{CounterConfig, InvalidConfig, DEFAULT_KEY};
pub use coordinator::Coordinator;
pub use error::CounterError;
pub use sleep::{Sleeper, TokioSleeper};

#[cfg(any(test, feature = "test-support"))]
pub use sleep::FakeSleeper;
