//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using
//! tokio synchronization primitives and LRU eviction policy.
//!
//! Integer counters live beside the LRU store and are never evicted: losing
//! a generation counter would let an old generation number come back and
//! revive entries cached under it.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use repokit_core::cache::{Cache, Result};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Creates a new cache entry with optional TTL.
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    /// Returns true if this entry has expired.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Thread-safe cache using `Arc<RwLock<LruCache>>` for concurrent access.
/// Supports TTL with lazy expiration (entries are dropped on access).
/// Uses LRU eviction to limit memory usage when max_entries is reached.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    /// Main key-value store with LRU eviction.
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    /// Counters written through `increment`.
    counters: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache with LRU eviction.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live entries, counters excluded.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let mut store = self.store.write().await;

            match store.get(key) {
                Some(entry) if entry.is_expired() => {
                    store.pop(key);
                    return Ok(None);
                }
                Some(entry) => return Ok(Some(entry.value.clone())),
                None => {}
            }
        }

        // Counters read back as their decimal text, as Redis stores them.
        let counters = self.counters.read().await;
        Ok(counters
            .get(key)
            .map(|value| value.to_string().into_bytes()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.counters.write().await.remove(key);

        let mut store = self.store.write().await;
        let entry = CacheEntry::new(value.to_vec(), ttl);
        store.put(key.to_string(), entry);

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.counters.write().await.remove(key);

        let mut store = self.store.write().await;
        store.pop(key);

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        {
            let store = self.store.read().await;
            if let Some(entry) = store.peek(key) {
                return Ok(!entry.is_expired());
            }
        }

        Ok(self.counters.read().await.contains_key(key))
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter = counter.saturating_add(delta);
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Default max entries for tests
    const TEST_MAX_ENTRIES: usize = 1000;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:key";
        let value = b"test value";

        cache.set(key, value, None).await.unwrap();
        let result = cache.get(key).await.unwrap();

        assert_eq!(result, Some(value.to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let result = cache.get("nonexistent:key").await.unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:delete";

        cache.set(key, b"to be deleted", None).await.unwrap();
        assert!(cache.exists(key).await.unwrap());

        cache.delete(key).await.unwrap();
        assert!(!cache.exists(key).await.unwrap());
        assert!(cache.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:ttl";

        cache
            .set(key, b"short-lived", Some(Duration::from_millis(50)))
            .await
            .unwrap();

        assert!(cache.get(key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!cache.exists(key).await.unwrap());
        assert!(cache.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_starts_at_zero() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        assert_eq!(cache.increment("gen", 0).await.unwrap(), 0);
        assert_eq!(cache.increment("gen", 1).await.unwrap(), 1);
        assert_eq!(cache.increment("gen", 5).await.unwrap(), 6);
        assert_eq!(cache.get("gen").await.unwrap(), Some(b"6".to_vec()));
    }

    #[tokio::test]
    async fn test_counters_survive_eviction() {
        let cache = MemoryCache::new(2);
        cache.increment("gen", 3).await.unwrap();

        cache.set("key1", b"1", None).await.unwrap();
        cache.set("key2", b"2", None).await.unwrap();
        cache.set("key3", b"3", None).await.unwrap();

        assert_eq!(cache.increment("gen", 0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_overwrite_value() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:overwrite";

        cache.set(key, b"first", None).await.unwrap();
        cache.set(key, b"second", None).await.unwrap();

        let result = cache.get(key).await.unwrap();
        assert_eq!(result, Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:no-ttl";

        cache.set(key, b"persistent", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get(key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(3);

        cache.set("key1", b"value1", None).await.unwrap();
        cache.set("key2", b"value2", None).await.unwrap();
        cache.set("key3", b"value3", None).await.unwrap();

        // Access key1 to make it recently used
        cache.get("key1").await.unwrap();

        // Insert a 4th entry - should evict key2 (least recently used)
        cache.set("key4", b"value4", None).await.unwrap();

        assert!(cache.get("key1").await.unwrap().is_some());
        assert!(cache.get("key2").await.unwrap().is_none());
        assert!(cache.get("key3").await.unwrap().is_some());
        assert!(cache.get("key4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_max_entries_holds_one() {
        let cache = MemoryCache::new(0);

        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();

        assert_eq!(cache.len().await, 1);
    }
}
