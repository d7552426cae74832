//! Process-local TTL cache backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::{Cache, CacheStats};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory cache with per-entry deadlines and a background sweep task.
///
/// Expired entries are invisible to reads immediately; the sweeper reclaims
/// their memory on an interval.
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Spawn the background sweep loop for this cache instance
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                let removed = {
                    let mut map = entries.write().unwrap();
                    let before = map.len();
                    map.retain(|_, entry| !entry.is_expired());
                    before - map.len()
                };
                if removed > 0 {
                    log::debug!("🧹 Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let map = self.entries.read().unwrap();
        match map.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.record_hit();
                Some(entry.value.clone())
            }
            _ => {
                self.record_miss();
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().unwrap().insert(key.to_string(), entry);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    async fn exists(&self, key: &str) -> bool {
        let map = self.entries.read().unwrap();
        map.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let map = self.entries.read().unwrap();
        let live = map.iter().filter(|(_, e)| !e.is_expired());
        match pattern.strip_suffix('*') {
            Some(prefix) => live
                .map(|(k, _)| k)
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => live
                .map(|(k, _)| k)
                .filter(|k| k.as_str() == pattern)
                .cloned()
                .collect(),
        }
    }

    async fn flush(&self) {
        self.entries.write().unwrap().clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.read().unwrap().len(),
        )
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "v1".to_string(), Duration::from_secs(60))
            .await;

        assert_eq!(cache.get("k1").await.as_deref(), Some("v1"));
        assert!(cache.exists("k1").await);
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("short", "v".to_string(), Duration::from_millis(20))
            .await;
        assert!(cache.exists("short").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("short").await, None);
        assert!(!cache.exists("short").await);
    }

    #[tokio::test]
    async fn test_keys_matching_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("tokens:a", "1".to_string(), ttl).await;
        cache.set("tokens:b", "2".to_string(), ttl).await;
        cache.set("other:c", "3".to_string(), ttl).await;

        let mut keys = cache.keys_matching("tokens:*").await;
        keys.sort();
        assert_eq!(keys, vec!["tokens:a", "tokens:b"]);

        assert_eq!(cache.keys_matching("other:c").await, vec!["other:c"]);
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await;

        cache.get("k").await;
        cache.get("k").await;
        cache.get("nope").await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set("gone", "v".to_string(), Duration::from_millis(10))
            .await;
        cache
            .set("kept", "v".to_string(), Duration::from_secs(60))
            .await;

        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        // Sweep removed the expired entry from the map itself
        assert_eq!(cache.entries.read().unwrap().len(), 1);
        assert!(cache.exists("kept").await);
    }

    #[tokio::test]
    async fn test_flush_clears_everything() {
        let cache = MemoryCache::new();
        cache
            .set("a", "1".to_string(), Duration::from_secs(60))
            .await;
        cache
            .set("b", "2".to_string(), Duration::from_secs(60))
            .await;

        cache.flush().await;
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.get("a").await, None);
    }
}
