//! Caching strategy execution for one (repository, aggregate type) pair.
//!
//! Reads receive the real inner call as a lazily awaited `setter` future.
//! On a hit the future is dropped without ever being polled.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use repokit_core::cache::{CacheKeyProvider, CacheOperation, CachingStrategy};
use repokit_core::storage::Result;

use super::{CacheGenerations, CachingProvider};

#[derive(Debug, Clone)]
pub struct RepositoryCache {
    strategy: CachingStrategy,
    default_expiration: Option<Duration>,
    keys: CacheKeyProvider,
    provider: CachingProvider,
    generations: CacheGenerations,
}

impl RepositoryCache {
    pub fn new(
        strategy: CachingStrategy,
        default_expiration: Option<Duration>,
        keys: CacheKeyProvider,
        generations: CacheGenerations,
    ) -> Self {
        Self {
            strategy,
            default_expiration,
            keys,
            provider: generations.provider().clone(),
            generations,
        }
    }

    pub fn strategy(&self) -> CachingStrategy {
        self.strategy
    }

    pub fn keys(&self) -> &CacheKeyProvider {
        &self.keys
    }

    // ========================================================================
    // Key resolution
    // ========================================================================

    /// Generation embedded in query keys. Constant zero for strategies that
    /// ignore generations.
    async fn generation(&self) -> Option<i64> {
        if self.strategy.is_generational() {
            self.generations.current(&self.keys).await
        } else {
            Some(0)
        }
    }

    async fn identity_key<K: Serialize + ?Sized>(
        &self,
        operation: CacheOperation,
        id: &K,
    ) -> Option<String> {
        if !self.strategy.is_enabled() {
            return None;
        }
        let global = self.generations.global().await?;
        self.keys
            .identity_key(global, operation, id)
            .map_err(|e| tracing::warn!(error = %e, "Failed to build cache key"))
            .ok()
    }

    async fn scoped_key<Q: Serialize + ?Sized>(
        &self,
        operation: CacheOperation,
        query: &Q,
    ) -> Option<String> {
        if !self.strategy.is_enabled() {
            return None;
        }
        let global = self.generations.global().await?;
        let generation = self.generation().await?;
        self.keys
            .generation_scoped_key(global, generation, operation, query)
            .map_err(|e| tracing::warn!(error = %e, "Failed to build cache key"))
            .ok()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Identity-scoped lookup. Absent items are not cached.
    pub async fn get<K, V, F>(&self, id: &K, setter: F) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: Serialize + DeserializeOwned,
        F: Future<Output = Result<Option<V>>>,
    {
        let Some(key) = self.identity_key(CacheOperation::Get, id).await else {
            return setter.await;
        };

        if let Some(value) = self.provider.get::<V>(&key).await {
            tracing::trace!(key = %key, "Cache hit");
            return Ok(Some(value));
        }

        tracing::trace!(key = %key, "Cache miss");
        let value = setter.await?;
        if let Some(value) = &value {
            self.provider
                .set(&key, value, self.strategy.identity_ttl())
                .await;
        }
        Ok(value)
    }

    /// Answers from the identity entry when present, otherwise asks the
    /// setter without caching its answer.
    pub async fn exists<K, F>(&self, id: &K, setter: F) -> Result<bool>
    where
        K: Serialize + ?Sized,
        F: Future<Output = Result<bool>>,
    {
        if let Some(key) = self.identity_key(CacheOperation::Get, id).await {
            if self.provider.exists(&key).await {
                tracing::trace!(key = %key, "Cache hit");
                return Ok(true);
            }
        }
        setter.await
    }

    /// Generation-scoped lookup used by every query shaped read.
    pub async fn query<Q, V, F>(&self, operation: CacheOperation, query: &Q, setter: F) -> Result<V>
    where
        Q: Serialize + ?Sized,
        V: Serialize + DeserializeOwned,
        F: Future<Output = Result<V>>,
    {
        let Some(key) = self.scoped_key(operation, query).await else {
            return setter.await;
        };

        if let Some(value) = self.provider.get::<V>(&key).await {
            tracing::trace!(key = %key, operation = %operation, "Cache hit");
            return Ok(value);
        }

        tracing::trace!(key = %key, operation = %operation, "Cache miss");
        let value = setter.await?;
        self.provider
            .set(&key, &value, self.strategy.query_ttl(self.default_expiration))
            .await;
        Ok(value)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write-through after a committed add or update.
    pub async fn store<K, V>(&self, id: &K, item: &V)
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        if let Some(key) = self.identity_key(CacheOperation::Get, id).await {
            self.provider
                .set(&key, item, self.strategy.identity_ttl())
                .await;
            tracing::debug!(key = %key, "Cache write-through");
        }
        self.next_generation().await;
    }

    /// Drops the identity entry and moves to the next generation.
    pub async fn evict<K: Serialize + ?Sized>(&self, id: &K) {
        if let Some(key) = self.identity_key(CacheOperation::Get, id).await {
            self.provider.remove(&key).await;
            tracing::debug!(key = %key, "Cache entry evicted");
        }
        self.next_generation().await;
    }

    /// Invalidates generation-scoped entries only.
    pub async fn next_generation(&self) {
        if self.strategy.is_generational() {
            self.generations.increment(&self.keys).await;
        }
    }
}
