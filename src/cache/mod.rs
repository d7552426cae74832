//! Read-through cache for merged snapshots and per-token lookups
//!
//! Two interchangeable backends behind one trait: a process-local TTL map
//! and a shared Redis store. The cache is an optimization layer only — every
//! backend failure degrades to a miss or a no-op, and merge decisions never
//! read from it. Values are JSON strings; typed access is a serde call at
//! the call site.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

/// Key for the full merged snapshot
pub const SNAPSHOT_KEY: &str = "tokens:snapshot";

/// Key for a single token entry
pub fn token_key(address: &str) -> String {
    format!("tokens:{}", address)
}

/// Hit/miss counters for observability
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64, size: usize) -> Self {
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        Self {
            hits,
            misses,
            hit_rate,
            size,
        }
    }
}

/// Cache backend contract
///
/// All operations are infallible from the caller's perspective: backend
/// errors are logged inside the implementation and reported as misses.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    async fn exists(&self, key: &str) -> bool;
    /// Keys matching a glob-style pattern. Only a trailing `*` wildcard is
    /// supported by the in-process backend; Redis applies its native rules.
    async fn keys_matching(&self, pattern: &str) -> Vec<String>;
    async fn flush(&self);
    fn stats(&self) -> CacheStats;
    fn is_connected(&self) -> bool;
}
