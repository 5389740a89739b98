// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator tests

use super::*;
use crate::sleep::FakeSleeper;
use abacus_adapters::{FakeStore, StoreCall, StoreError};
use std::sync::Arc;
use std::time::Duration;
use yare::parameterized;

const KEY: &str = "abacus:sum";

fn setup() -> (Coordinator<FakeStore, FakeSleeper>, FakeStore, FakeSleeper) {
    setup_with(CounterConfig::default())
}

fn setup_with(
    config: CounterConfig,
) -> (Coordinator<FakeStore, FakeSleeper>, FakeStore, FakeSleeper) {
    let store = FakeStore::new();
    let sleeper = FakeSleeper::new();
    let coordinator = Coordinator::new(store.clone(), sleeper.clone(), config);
    (coordinator, store, sleeper)
}

fn begins(store: &FakeStore) -> usize {
    store.count_calls(|c| matches!(c, StoreCall::Begin { .. }))
}

fn commits(store: &FakeStore) -> usize {
    store.count_calls(|c| matches!(c, StoreCall::Commit { .. }))
}

// =============================================================================
// Increment protocol
// =============================================================================

#[tokio::test]
async fn add_treats_absent_key_as_zero() {
    let (coordinator, store, sleeper) = setup();

    assert_eq!(coordinator.add(5).await.unwrap(), 5);
    assert_eq!(store.value(KEY), Some(5));
    assert_eq!(begins(&store), 1);
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn add_accumulates_positive_and_negative_deltas() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 100);

    assert_eq!(coordinator.add(-30).await.unwrap(), 70);
    assert_eq!(coordinator.add(0).await.unwrap(), 70);
    assert_eq!(coordinator.add(12).await.unwrap(), 82);
    assert_eq!(coordinator.get().await.unwrap(), 82);
}

#[tokio::test]
async fn add_retries_after_conflict_against_updated_value() {
    let (coordinator, store, sleeper) = setup();
    store.insert(KEY, 40);
    store.conflict_next(1);

    assert_eq!(coordinator.add(2).await.unwrap(), 42);
    assert_eq!(begins(&store), 2);
    assert_eq!(commits(&store), 2);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(10)]);
}

#[tokio::test]
async fn add_uses_configured_retry_delay() {
    let config = CounterConfig::default().with_retry_delay(Duration::from_millis(3));
    let (coordinator, store, sleeper) = setup_with(config);
    store.conflict_next(4);

    assert_eq!(coordinator.add(1).await.unwrap(), 1);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(3); 4]);
    assert_eq!(sleeper.total(), Duration::from_millis(12));
}

#[parameterized(
    single_attempt = { 1 },
    few_attempts = { 3 },
    default_budget = { 100 },
)]
#[test_macro(tokio::test)]
async fn add_gives_up_after_exactly_max_attempts(max_attempts: u32) {
    let config = CounterConfig::default().with_max_attempts(max_attempts);
    let (coordinator, store, sleeper) = setup_with(config);
    store.insert(KEY, 7);
    store.conflict_always();

    let err = coordinator.add(1).await.unwrap_err();

    assert!(
        matches!(err, CounterError::ContentionExhausted { attempts } if attempts == max_attempts),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(begins(&store), max_attempts as usize);
    assert_eq!(commits(&store), max_attempts as usize);
    // No pause after the final attempt
    assert_eq!(sleeper.sleeps().len(), max_attempts as usize - 1);
    assert_eq!(store.value(KEY), Some(7));
}

#[tokio::test]
async fn add_succeeds_on_last_allowed_attempt() {
    let config = CounterConfig::default().with_max_attempts(5);
    let (coordinator, store, _) = setup_with(config);
    store.conflict_next(4);

    assert_eq!(coordinator.add(9).await.unwrap(), 9);
    assert_eq!(begins(&store), 5);
}

#[tokio::test]
async fn add_reports_overflow_without_writing() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, i64::MAX);

    let err = coordinator.add(1).await.unwrap_err();

    assert!(matches!(
        err,
        CounterError::Overflow {
            current: i64::MAX,
            delta: 1
        }
    ));
    assert_eq!(commits(&store), 0);
    assert_eq!(store.value(KEY), Some(i64::MAX));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_adds_lose_no_updates() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 5);
    let coordinator = Arc::new(coordinator);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.add(1).await })
        })
        .collect();

    let mut returned = Vec::new();
    for handle in handles {
        returned.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(coordinator.get().await.unwrap(), 55);
    // Every caller saw a distinct post-increment value
    returned.sort_unstable();
    assert_eq!(returned, (6..=55).collect::<Vec<_>>());
    // Contention really happened
    assert!(commits(&store) > 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_from_two_nodes_lose_no_updates() {
    let store = FakeStore::new();
    store.insert(KEY, 0);
    let node_a = Arc::new(Coordinator::new(
        store.clone(),
        FakeSleeper::new(),
        CounterConfig::default(),
    ));
    let node_b = Arc::new(Coordinator::new(
        store.clone(),
        FakeSleeper::new(),
        CounterConfig::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..40 {
        let node = if i % 2 == 0 {
            Arc::clone(&node_a)
        } else {
            Arc::clone(&node_b)
        };
        handles.push(tokio::spawn(async move { node.add(3).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.value(KEY), Some(120));
}

#[tokio::test]
async fn concurrent_callers_return_prefix_sums() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 0);
    let coordinator = Arc::new(coordinator);

    let handles: Vec<_> = [10, 20, 30]
        .into_iter()
        .map(|delta| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.add(delta).await })
        })
        .collect();

    let mut returned = Vec::new();
    for handle in handles {
        returned.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(coordinator.get().await.unwrap(), 60);

    // Sorted results must form a chain whose steps are the three deltas
    returned.sort_unstable();
    assert_eq!(returned[2], 60);
    let mut steps = vec![returned[0], returned[1] - returned[0], returned[2] - returned[1]];
    steps.sort_unstable();
    assert_eq!(steps, vec![10, 20, 30]);
}

// =============================================================================
// Read, reset, stats
// =============================================================================

#[tokio::test]
async fn get_returns_zero_when_absent() {
    let (coordinator, _, _) = setup();
    assert_eq!(coordinator.get().await.unwrap(), 0);
}

#[tokio::test]
async fn reset_then_get_returns_zero() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 1234);

    coordinator.reset().await.unwrap();

    assert_eq!(coordinator.get().await.unwrap(), 0);
}

#[tokio::test]
async fn reset_is_an_unguarded_write() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 5);

    coordinator.reset().await.unwrap();

    assert!(store.calls().contains(&StoreCall::Set {
        key: KEY.to_string(),
        value: 0
    }));
    assert_eq!(begins(&store), 0);
}

#[tokio::test]
async fn add_racing_reset_retries_against_zero() {
    let (coordinator, store, sleeper) = setup();
    store.insert(KEY, 50);
    let coordinator = Arc::new(coordinator);

    let adder = Arc::clone(&coordinator);
    let handle = tokio::spawn(async move { adder.add(7).await });

    // Let the add watch and start reading, then reset underneath it
    while store.count_calls(|c| matches!(c, StoreCall::Read { .. })) == 0 {
        tokio::task::yield_now().await;
    }
    coordinator.reset().await.unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), 7);
    assert_eq!(store.value(KEY), Some(7));
    // The first commit lost to the reset and the second one won
    assert_eq!(begins(&store), 2);
    assert_eq!(commits(&store), 2);
    assert_eq!(sleeper.sleeps().len(), 1);
}

#[tokio::test]
async fn reset_overwrites_committed_add() {
    let (coordinator, store, _) = setup();
    store.insert(KEY, 50);

    assert_eq!(coordinator.add(7).await.unwrap(), 57);
    coordinator.reset().await.unwrap();

    assert_eq!(coordinator.get().await.unwrap(), 0);
    assert_eq!(store.value(KEY), Some(0));
}

#[tokio::test]
async fn stats_pass_through_store_counters() {
    let (coordinator, store, _) = setup();
    let mut stats = StoreStats::new();
    stats.insert("connected_clients".to_string(), 3.into());
    store.set_stats(stats.clone());

    assert_eq!(coordinator.stats().await, stats);
}

#[tokio::test]
async fn stats_are_empty_when_store_fails() {
    let (coordinator, store, _) = setup();
    let mut stats = StoreStats::new();
    stats.insert("connected_clients".to_string(), 3.into());
    store.set_stats(stats);
    store.set_unavailable(true);

    assert!(coordinator.stats().await.is_empty());
}

// =============================================================================
// Unavailable store
// =============================================================================

#[tokio::test]
async fn unavailable_store_fails_fast_without_retry() {
    let (coordinator, store, sleeper) = setup();
    store.insert(KEY, 8);
    store.set_unavailable(true);

    assert!(matches!(
        coordinator.add(1).await,
        Err(CounterError::StoreUnavailable(StoreError::Unavailable(_)))
    ));
    assert!(matches!(
        coordinator.get().await,
        Err(CounterError::StoreUnavailable(_))
    ));
    assert!(matches!(
        coordinator.reset().await,
        Err(CounterError::StoreUnavailable(_))
    ));

    assert_eq!(begins(&store), 1);
    assert!(sleeper.sleeps().is_empty());
    assert_eq!(store.value(KEY), Some(8));
}

#[tokio::test]
async fn error_kinds_are_distinct() {
    let unavailable = CounterError::from(StoreError::Closed);
    let exhausted = CounterError::ContentionExhausted { attempts: 100 };

    assert_eq!(unavailable.kind(), "store_unavailable");
    assert_eq!(exhausted.kind(), "contention_exhausted");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn bootstrap_initializes_absent_key() {
    let config = CounterConfig::default().with_initial_value(0);
    let (coordinator, store, _) = setup_with(config);

    assert!(coordinator.bootstrap().await.unwrap());
    assert_eq!(store.value(KEY), Some(0));
}

#[tokio::test]
async fn bootstrap_twice_never_resets_existing_value() {
    let (coordinator, store, _) = setup();

    assert!(coordinator.bootstrap().await.unwrap());
    coordinator.add(42).await.unwrap();
    assert!(!coordinator.bootstrap().await.unwrap());

    assert_eq!(store.value(KEY), Some(42));
}

#[tokio::test]
async fn bootstrap_yields_to_concurrent_initializer() {
    let (coordinator, store, _) = setup();
    // Another node writes the key between our watch and our commit
    store.conflict_next(1);

    assert!(!coordinator.bootstrap().await.unwrap());
    assert_eq!(
        store.count_calls(|c| matches!(c, StoreCall::Set { .. })),
        0
    );
}

#[tokio::test]
async fn bootstrap_fails_when_store_unavailable() {
    let (coordinator, store, _) = setup();
    store.set_unavailable(true);

    assert!(matches!(
        coordinator.bootstrap().await,
        Err(CounterError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn shutdown_closes_store() {
    let (coordinator, store, _) = setup();

    coordinator.shutdown().await;

    assert!(store.is_closed());
    assert!(matches!(
        coordinator.get().await,
        Err(CounterError::StoreUnavailable(StoreError::Closed))
    ));
}
