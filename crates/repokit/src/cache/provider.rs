//! Best-effort typed access to the cache backend.
//!
//! Every call hashes its key, serializes values as JSON and swallows backend
//! failures: errors are logged and reported as a miss or a no-op so the
//! repository keeps working when the cache does not.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use repokit_core::cache::serialization::{deserialize, serialize};
use repokit_core::cache::Cache;

use super::MemoryCache;

/// Prefix of every hashed key written by the provider.
const HASHED_KEY_PREFIX: &str = "repokit:";

#[derive(Clone)]
pub struct CachingProvider {
    cache: Arc<dyn Cache>,
}

impl fmt::Debug for CachingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingProvider").finish_non_exhaustive()
    }
}

impl CachingProvider {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Provider over a fresh process-local LRU cache.
    pub fn memory(max_entries: usize) -> Self {
        Self::new(Arc::new(MemoryCache::new(max_entries)))
    }

    /// Maps a logical key to the key stored in the backend.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{HASHED_KEY_PREFIX}{:x}", hasher.finalize())
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let hashed = Self::hash_key(key);
        let bytes = match self.cache.get(&hashed).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache get failed, treating as miss");
                return None;
            }
        };

        match deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cached value unreadable, treating as miss");
                None
            }
        }
    }

    pub async fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V, ttl: Option<Duration>) {
        let bytes = match serialize(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to serialize value for cache");
                return;
            }
        };

        if let Err(e) = self.cache.set(&Self::hash_key(key), &bytes, ttl).await {
            tracing::warn!(error = %e, key = %key, "Cache set failed");
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.cache.delete(&Self::hash_key(key)).await {
            tracing::warn!(error = %e, key = %key, "Cache delete failed");
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.cache.exists(&Self::hash_key(key)).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache exists failed, treating as miss");
                false
            }
        }
    }

    /// Adds `delta` to a counter. `None` means the counter is unavailable.
    pub async fn increment(&self, key: &str, delta: i64) -> Option<i64> {
        match self.cache.increment(&Self::hash_key(key), delta).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, delta, "Cache increment failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FailingCache;

    #[test]
    fn test_hash_key_is_stable_and_opaque() {
        let first = CachingProvider::hash_key("Repositories/0/default/Person/Get/1");
        let second = CachingProvider::hash_key("Repositories/0/default/Person/Get/1");
        let other = CachingProvider::hash_key("Repositories/0/default/Person/Get/2");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with(HASHED_KEY_PREFIX));
        assert_eq!(first.len(), HASHED_KEY_PREFIX.len() + 64);
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let provider = CachingProvider::memory(16);

        provider.set("count", &42_usize, None).await;

        assert_eq!(provider.get::<usize>("count").await, Some(42));
        assert!(provider.exists("count").await);

        provider.remove("count").await;
        assert_eq!(provider.get::<usize>("count").await, None);
    }

    #[tokio::test]
    async fn test_cached_none_is_a_hit() {
        let provider = CachingProvider::memory(16);

        provider.set("find", &Option::<String>::None, None).await;

        assert_eq!(provider.get::<Option<String>>("find").await, Some(None));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let provider = CachingProvider::memory(16);

        provider.set("key", "text", None).await;

        assert_eq!(provider.get::<i64>("key").await, None);
    }

    #[tokio::test]
    async fn test_backend_failures_are_swallowed() {
        let provider = CachingProvider::new(Arc::new(FailingCache));

        provider.set("key", &1, None).await;
        provider.remove("key").await;

        assert_eq!(provider.get::<i32>("key").await, None);
        assert!(!provider.exists("key").await);
        assert_eq!(provider.increment("gen", 1).await, None);
    }
}
