// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis store adapter
//!
//! Plain reads and writes go through one [`ConnectionManager`], which
//! reconnects after the server drops the socket. WATCH state is scoped to a
//! connection, so every optimistic transaction gets a dedicated connection
//! from a small idle pool and gives it back only after EXEC has cleared the
//! watch.

use super::{CommitOutcome, CounterStore, StoreError, StoreStats, StoreTransaction};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{FromRedisValue, RedisError, RedisResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// INFO fields surfaced through [`CounterStore::stats`]
const STAT_FIELDS: &[&str] = &[
    "connected_clients",
    "total_commands_processed",
    "used_memory_human",
];

/// Reconnect backoff for the shared connection: one retry, 2^n * 50ms
const RECONNECT_EXPONENT_BASE: u64 = 2;
const RECONNECT_FACTOR_MS: u64 = 50;
const RECONNECT_RETRIES: usize = 1;

/// Connection parameters for [`RedisStore`]
#[derive(Debug, Clone)]
pub struct RedisOptions {
    pub host: String,
    pub port: u16,
    /// Logical database index
    pub db: i64,
    pub connect_timeout: Duration,
    /// Interval between background PINGs on the shared connection
    pub keepalive: Option<Duration>,
    /// Maximum idle connections kept for transactions
    pub pool_size: usize,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            connect_timeout: Duration::from_secs(5),
            keepalive: Some(Duration::from_secs(30)),
            pool_size: 16,
        }
    }
}

impl RedisOptions {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// The socket under a command went away; a new connection may succeed
fn is_disconnect(e: &RedisError) -> bool {
    e.is_connection_dropped() || e.is_io_error() || e.is_unrecoverable_error()
}

struct Shared {
    client: redis::Client,
    // None once closed
    conn: Mutex<Option<ConnectionManager>>,
    idle: Mutex<Vec<MultiplexedConnection>>,
    options: RedisOptions,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn manager(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(StoreError::Closed)
    }

    /// Run a command on the shared connection, once more after a disconnect
    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, StoreError> {
        let mut conn = self.manager()?;
        let first: RedisResult<T> = cmd.query_async(&mut conn).await;
        match first {
            Ok(value) => Ok(value),
            Err(e) if is_disconnect(&e) => {
                tracing::warn!(error = %e, "redis connection dropped, retrying after reconnect");
                let mut conn = self.manager()?;
                let second: RedisResult<T> = cmd.query_async(&mut conn).await;
                Ok(second?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Take an idle connection or open a new one; the flag marks pooled ones
    async fn checkout(&self) -> Result<(MultiplexedConnection, bool), StoreError> {
        self.ensure_open()?;
        let pooled = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match pooled {
            Some(conn) => Ok((conn, true)),
            None => Ok((open_connection(&self.client, self.options.connect_timeout).await?, false)),
        }
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.options.pool_size {
            idle.push(conn);
        }
    }

    fn drain_idle(&self) -> usize {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        let stale = idle.len();
        idle.clear();
        stale
    }
}

async fn open_connection(
    client: &redis::Client,
    timeout: Duration,
) -> Result<MultiplexedConnection, StoreError> {
    match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

async fn open_manager(
    client: &redis::Client,
    timeout: Duration,
) -> Result<ConnectionManager, StoreError> {
    let connect = ConnectionManager::new_with_backoff(
        client.clone(),
        RECONNECT_EXPONENT_BASE,
        RECONNECT_FACTOR_MS,
        RECONNECT_RETRIES,
    );
    match tokio::time::timeout(timeout, connect).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisStore {
    shared: Arc<Shared>,
}

impl RedisStore {
    /// Connect and verify the server answers a PING
    pub async fn connect(options: RedisOptions) -> Result<Self, StoreError> {
        let client = redis::Client::open(options.url())?;
        let conn = open_manager(&client, options.connect_timeout).await?;

        let store = Self {
            shared: Arc::new(Shared {
                client,
                conn: Mutex::new(Some(conn.clone())),
                idle: Mutex::new(Vec::new()),
                options,
                keepalive: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        };
        store.ping().await?;

        if let Some(interval) = store.shared.options.keepalive {
            let handle = tokio::spawn(keepalive_loop(conn, interval));
            *store
                .shared
                .keepalive
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(handle);
        }

        Ok(store)
    }

    /// Number of idle transaction connections
    pub fn idle_connections(&self) -> usize {
        self.shared
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

// A failed PING also makes the manager reconnect
async fn keepalive_loop(mut conn: ConnectionManager, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "redis keepalive ping failed");
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    type Transaction = RedisTransaction;

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.shared.ensure_open()?;
        self.shared.query(redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.shared.ensure_open()?;
        self.shared.query(redis::cmd("SET").arg(key).arg(value)).await
    }

    async fn begin_optimistic(&self, key: &str) -> Result<RedisTransaction, StoreError> {
        let (mut conn, pooled) = self.shared.checkout().await?;
        let mut watch = redis::cmd("WATCH");
        watch.arg(key);

        let result: RedisResult<()> = watch.query_async(&mut conn).await;
        let conn = match result {
            Ok(()) => conn,
            // The server closed idle sockets, most likely all of them
            Err(e) if pooled && is_disconnect(&e) => {
                let stale = self.shared.drain_idle() + 1;
                tracing::debug!(stale, error = %e, "discarding stale pooled connections");
                let mut fresh =
                    open_connection(&self.shared.client, self.shared.options.connect_timeout)
                        .await?;
                let _: () = watch.query_async(&mut fresh).await?;
                fresh
            }
            Err(e) => return Err(e.into()),
        };

        Ok(RedisTransaction {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.shared.ensure_open()?;
        let _: String = self.shared.query(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.shared.ensure_open()?;
        let info: redis::InfoDict = self.shared.query(&redis::cmd("INFO")).await?;

        let mut stats = StoreStats::new();
        for field in STAT_FIELDS {
            let value = match info.get::<i64>(field) {
                Some(n) => serde_json::Value::from(n),
                None => match info.get::<String>(field) {
                    Some(s) => serde_json::Value::from(s),
                    None => continue,
                },
            };
            stats.insert((*field).to_string(), value);
        }
        Ok(stats)
    }

    async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self
            .shared
            .keepalive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.shared.drain_idle();
        drop(
            self.shared
                .conn
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
        tracing::info!("redis connections released");
    }
}

/// WATCH-based transaction on a dedicated connection
///
/// A transaction dropped before commit or discard still has its watch armed,
/// so its connection is closed instead of returned to the pool. The same
/// goes for a connection whose command failed.
pub struct RedisTransaction {
    // None once committed or discarded
    conn: Option<MultiplexedConnection>,
    shared: Arc<Shared>,
}

impl RedisTransaction {
    fn conn(&mut self) -> Result<&mut MultiplexedConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl StoreTransaction for RedisTransaction {
    async fn read(&mut self, key: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn()?;
        let result: RedisResult<Option<i64>> = redis::cmd("GET").arg(key).query_async(conn).await;
        if result.is_err() {
            self.conn = None;
        }
        Ok(result?)
    }

    async fn commit_if_unchanged(
        mut self,
        writes: &[(&str, i64)],
    ) -> Result<CommitOutcome, StoreError> {
        let mut conn = self.conn.take().ok_or(StoreError::Closed)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in writes {
            pipe.set(*key, *value).ignore();
        }

        // EXEC replies nil when a watched key changed
        let reply: Option<()> = pipe.query_async(&mut conn).await?;
        self.shared.checkin(conn);

        Ok(match reply {
            Some(()) => CommitOutcome::Committed,
            None => CommitOutcome::Conflict,
        })
    }

    async fn discard(mut self) -> Result<(), StoreError> {
        let mut conn = self.conn.take().ok_or(StoreError::Closed)?;
        let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
        self.shared.checkin(conn);
        Ok(())
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
