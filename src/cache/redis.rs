//! Shared Redis cache backend
//!
//! Same contract as the in-process map, with remote failure modes: every
//! Redis error is caught, logged, and reported as a miss or a no-op. A
//! failed connection is dropped and re-established lazily on the next
//! operation.

use async_trait::async_trait;
use redis::{Commands, Connection};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Cache, CacheStats};

pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<Connection>>,
    connected: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisCache {
    /// Open a client and establish the initial connection.
    ///
    /// Construction is the one place a Redis error propagates, so the
    /// caller can fall back to the in-process backend at wiring time.
    pub fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection()?;
        log::info!("🔌 Connected to Redis at {}", url);

        Ok(Self {
            client,
            connection: Mutex::new(Some(connection)),
            connected: AtomicBool::new(true),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Run `op` against the shared connection, reconnecting if it was
    /// dropped after an earlier failure. Any error marks the backend
    /// disconnected and is handed back for the caller to swallow.
    async fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> redis::RedisResult<T> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            match self.client.get_connection() {
                Ok(conn) => {
                    log::info!("🔌 Re-established Redis connection");
                    *guard = Some(conn);
                }
                Err(e) => {
                    self.connected.store(false, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        let conn = guard.as_mut().unwrap();
        match op(conn) {
            Ok(value) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(value)
            }
            Err(e) => {
                // Drop the connection; the next call reconnects
                *guard = None;
                self.connected.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let result: redis::RedisResult<Option<String>> =
            self.with_conn(|conn| conn.get(key)).await;
        match result {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                log::warn!("Redis GET {} failed, treating as miss: {}", key, e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let secs = ttl.as_secs().max(1);
        let result: redis::RedisResult<()> = self
            .with_conn(|conn| {
                redis::cmd("SET")
                    .arg(key)
                    .arg(&value)
                    .arg("EX")
                    .arg(secs)
                    .query(conn)
            })
            .await;
        if let Err(e) = result {
            log::warn!("Redis SET {} failed, skipping cache write: {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let result: redis::RedisResult<()> = self.with_conn(|conn| conn.del(key)).await;
        if let Err(e) = result {
            log::warn!("Redis DEL {} failed: {}", key, e);
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let result: redis::RedisResult<bool> = self.with_conn(|conn| conn.exists(key)).await;
        match result {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Redis EXISTS {} failed, treating as absent: {}", key, e);
                false
            }
        }
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let result: redis::RedisResult<Vec<String>> =
            self.with_conn(|conn| conn.keys(pattern)).await;
        match result {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Redis KEYS {} failed: {}", pattern, e);
                Vec::new()
            }
        }
    }

    async fn flush(&self) {
        let result: redis::RedisResult<()> = self
            .with_conn(|conn| redis::cmd("FLUSHDB").query(conn))
            .await;
        if let Err(e) = result {
            log::warn!("Redis FLUSHDB failed: {}", e);
        }
    }

    fn stats(&self) -> CacheStats {
        // Best-effort size probe; skipped when the connection is busy
        let size = match self.connection.try_lock() {
            Ok(mut guard) => guard
                .as_mut()
                .and_then(|conn| redis::cmd("DBSIZE").query::<usize>(conn).ok())
                .unwrap_or(0),
            Err(_) => 0,
        };
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            size,
        )
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
