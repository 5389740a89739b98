// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sleep abstraction for testable retry delays

use async_trait::async_trait;
use std::time::Duration;

/// Waits between retry attempts
#[async_trait]
pub trait Sleeper: Clone + Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Real timer backed by tokio
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSleeper;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::Sleeper;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Fake sleeper for testing: records each requested delay and only
    /// yields to the scheduler instead of waiting
    #[derive(Clone, Default)]
    pub struct FakeSleeper {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl FakeSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every delay requested so far
        pub fn sleeps(&self) -> Vec<Duration> {
            self.slept.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        /// Sum of all requested delays
        pub fn total(&self) -> Duration {
            self.sleeps().iter().sum()
        }
    }

    #[async_trait]
    impl Sleeper for FakeSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(duration);
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
#[path = "sleep_tests.rs"]
mod tests;
