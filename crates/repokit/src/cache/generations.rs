use std::sync::Arc;

use tokio::sync::Mutex;

use repokit_core::cache::{CacheKeyProvider, GLOBAL_GENERATION_KEY};

use super::CachingProvider;

/// Owns the generation counters used to invalidate cached queries.
///
/// Constructed once and shared by every repository that uses the same cache.
/// Counters are read with a zero increment, so a read never creates a gap or
/// resets a counter. `None` means the counter could not be reached and the
/// caller must not trust any generation-scoped entry.
#[derive(Debug, Clone)]
pub struct CacheGenerations {
    provider: CachingProvider,
    lock: Arc<Mutex<()>>,
}

impl CacheGenerations {
    pub fn new(provider: CachingProvider) -> Self {
        Self {
            provider,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn provider(&self) -> &CachingProvider {
        &self.provider
    }

    pub async fn global(&self) -> Option<i64> {
        self.provider.increment(GLOBAL_GENERATION_KEY, 0).await
    }

    pub async fn current(&self, keys: &CacheKeyProvider) -> Option<i64> {
        self.provider.increment(&keys.generation_key(), 0).await
    }

    /// Moves a (repository, type) pair to its next generation.
    pub async fn increment(&self, keys: &CacheKeyProvider) -> Option<i64> {
        let _guard = self.lock.lock().await;
        let generation = self.provider.increment(&keys.generation_key(), 1).await;
        tracing::debug!(
            repository = %keys.repository(),
            entity_type = keys.type_name(),
            generation = ?generation,
            "Cache generation incremented"
        );
        generation
    }

    /// Invalidates every cached entry of every repository.
    pub async fn invalidate_all(&self) -> Option<i64> {
        let _guard = self.lock.lock().await;
        let generation = self.provider.increment(GLOBAL_GENERATION_KEY, 1).await;
        tracing::debug!(generation = ?generation, "Global cache generation incremented");
        generation
    }
}
