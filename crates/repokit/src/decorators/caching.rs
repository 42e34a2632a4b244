//! Caching decorator.
//!
//! Reads go through the [`RepositoryCache`] with the inner call as setter.
//! Writes reach the inner layer first, then the cache is written through
//! (immediate mode) or invalidated now and again once the context commits
//! (unit of work mode, where the write is not visible yet). A failed write
//! still invalidates the ids it touched and every query result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::cache::CacheOperation;
use repokit_core::entity::AggregateRoot;
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, Result};

use crate::cache::RepositoryCache;
use crate::context::UnitOfWorkContext;

pub struct CachingRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
    cache: RepositoryCache,
    context: Arc<dyn UnitOfWorkContext>,
}

impl<T: AggregateRoot> CachingRepository<T> {
    pub fn new(
        inner: Arc<dyn Repository<T>>,
        cache: RepositoryCache,
        context: Arc<dyn UnitOfWorkContext>,
    ) -> Self {
        Self {
            inner,
            cache,
            context,
        }
    }

    fn enabled(&self) -> bool {
        self.cache.strategy().is_enabled()
    }

    async fn written(&self, items: &[T]) {
        if !self.enabled() {
            return;
        }
        if self.context.is_immediate() {
            for item in items {
                self.cache.store(item.id(), item).await;
            }
        } else {
            self.invalidate(items.iter().map(|item| item.id().clone()).collect())
                .await;
        }
    }

    async fn removed(&self, ids: Vec<T::Key>) {
        if !self.enabled() {
            return;
        }
        if self.context.is_immediate() {
            for id in &ids {
                self.cache.evict(id).await;
            }
        } else {
            self.invalidate(ids).await;
        }
    }

    /// Runs after a write below the cache failed. The inner layer may have
    /// applied part of it, so the touched ids and query results are dropped.
    async fn settle<R>(&self, result: Result<R>, ids: Vec<T::Key>) -> Result<R> {
        if result.is_err() && self.enabled() {
            if ids.is_empty() {
                self.cache.next_generation().await;
            }
            for id in &ids {
                self.cache.evict(id).await;
            }
        }
        result
    }

    /// Evicts now, so reads stop serving what the pending write replaces,
    /// and again after commit, so reads made in between are dropped too.
    async fn invalidate(&self, ids: Vec<T::Key>) {
        for id in &ids {
            self.cache.evict(id).await;
        }

        let cache = self.cache.clone();
        self.context
            .after_commit(Box::new(move || {
                Box::pin(async move {
                    for id in &ids {
                        cache.evict(id).await;
                    }
                })
            }))
            .await;
    }
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for CachingRepository<T> {
    // ========================================================================
    // Writes
    // ========================================================================

    async fn add(&self, item: T) -> Result<T> {
        let added = self.settle(self.inner.add(item).await, Vec::new()).await?;
        self.written(std::slice::from_ref(&added)).await;
        Ok(added)
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        let added = self
            .settle(self.inner.add_range(items).await, Vec::new())
            .await?;
        self.written(&added).await;
        Ok(added)
    }

    async fn update(&self, item: T) -> Result<T> {
        let id = item.id().clone();
        let updated = self.settle(self.inner.update(item).await, vec![id]).await?;
        self.written(std::slice::from_ref(&updated)).await;
        Ok(updated)
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        let ids: Vec<T::Key> = items.iter().map(|item| item.id().clone()).collect();
        let updated = self.settle(self.inner.update_range(items).await, ids).await?;
        self.written(&updated).await;
        Ok(updated)
    }

    async fn remove(&self, item: T) -> Result<T> {
        let id = item.id().clone();
        let removed = self
            .settle(self.inner.remove(item).await, vec![id.clone()])
            .await?;
        self.removed(vec![id]).await;
        Ok(removed)
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        self.settle(self.inner.remove_by_id(id).await, vec![id.clone()])
            .await?;
        self.removed(vec![id.clone()]).await;
        Ok(())
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        if !self.enabled() {
            return self.inner.remove_where(filter).await;
        }
        let items = self.inner.find_many(filter, None).await?;
        if items.is_empty() {
            return Ok(0);
        }
        let ids: Vec<T::Key> = items.iter().map(|item| item.id().clone()).collect();
        let removed = self
            .settle(self.inner.remove_range(items).await, ids.clone())
            .await?
            .len();
        self.removed(ids).await;
        Ok(removed)
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        let ids: Vec<T::Key> = items.iter().map(|item| item.id().clone()).collect();
        let removed = self
            .settle(self.inner.remove_range(items).await, ids.clone())
            .await?;
        self.removed(ids).await;
        Ok(removed)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        self.cache.get(id, self.inner.get(id)).await
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        self.cache
            .query(
                CacheOperation::GetProjection,
                &(id, selector),
                self.inner.get_projection(id, selector),
            )
            .await
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        self.cache.exists(id, self.inner.exists(id)).await
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        self.cache
            .query(
                CacheOperation::ExistsWhere,
                filter,
                self.inner.exists_where(filter),
            )
            .await
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        self.cache
            .query(
                CacheOperation::FindOne,
                &(filter, options),
                self.inner.find_one(filter, options),
            )
            .await
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        self.cache
            .query(
                CacheOperation::FindOneProjection,
                &(filter, selector, options),
                self.inner.find_one_projection(filter, selector, options),
            )
            .await
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        self.cache
            .query(
                CacheOperation::FindMany,
                &(filter, options),
                self.inner.find_many(filter, options),
            )
            .await
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        self.cache
            .query(
                CacheOperation::FindManyProjection,
                &(filter, selector, options),
                self.inner.find_many_projection(filter, selector, options),
            )
            .await
    }

    async fn count(&self) -> Result<usize> {
        self.cache
            .query(CacheOperation::Count, &Filter::All, self.inner.count())
            .await
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        self.cache
            .query(CacheOperation::Count, filter, self.inner.count_where(filter))
            .await
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        self.cache
            .query(
                CacheOperation::Sum,
                &(field, filter),
                self.inner.sum(field, filter),
            )
            .await
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        self.cache
            .query(
                CacheOperation::Average,
                &(field, filter),
                self.inner.average(field, filter),
            )
            .await
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::{CacheGenerations, CachingProvider};
    use crate::context::CommandBuffer;
    use crate::fixtures::{person, persisted, FailingCache, Person, SpyRepository};
    use crate::storage::{DocumentRepository, InMemoryStore};
    use repokit_core::cache::{CacheKeyProvider, CachingStrategy};
    use repokit_core::options::RepositoryName;
    use tokio_util::sync::CancellationToken;

    fn repository_cache(strategy: CachingStrategy, provider: CachingProvider) -> RepositoryCache {
        RepositoryCache::new(
            strategy,
            None,
            CacheKeyProvider::new(RepositoryName::default(), Person::TYPE_NAME),
            CacheGenerations::new(provider),
        )
    }

    fn cached(strategy: CachingStrategy) -> (CachingRepository<Person>, Arc<SpyRepository<Person>>) {
        cached_with(strategy, CachingProvider::memory(256))
    }

    fn cached_with(
        strategy: CachingStrategy,
        provider: CachingProvider,
    ) -> (CachingRepository<Person>, Arc<SpyRepository<Person>>) {
        let spy = Arc::new(SpyRepository::<Person>::new());
        let context: Arc<dyn UnitOfWorkContext> =
            Arc::new(CommandBuffer::<InMemoryStore>::immediate());
        let repo = CachingRepository::new(
            spy.clone(),
            repository_cache(strategy, provider),
            context,
        );
        (repo, spy)
    }

    #[tokio::test]
    async fn test_write_through_serves_get_from_cache() {
        let (repo, spy) = cached(CachingStrategy::Standard);

        let added = repo.add(person("Tester", 30)).await.unwrap();
        let fetched = repo.get(&added.id).await.unwrap();

        assert_eq!(fetched, Some(added));
        assert_eq!(spy.calls.reads(), 0);
    }

    #[tokio::test]
    async fn test_writes_orphan_query_entries() {
        let (repo, spy) = cached(CachingStrategy::Standard);

        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(spy.calls.reads(), 1);

        let added = repo.add(person("Tester", 30)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(
            repo.find_many(&Filter::All, None).await.unwrap(),
            vec![added.clone()]
        );
        assert_eq!(spy.calls.reads(), 3);

        repo.remove(added).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.find_many(&Filter::All, None).await.unwrap().is_empty());
        assert_eq!(spy.calls.reads(), 5);
    }

    #[tokio::test]
    async fn test_remove_evicts_identity_entry() {
        let (repo, _spy) = cached(CachingStrategy::Standard);
        let added = repo.add(person("Tester", 30)).await.unwrap();
        let id = added.id;

        repo.remove_by_id(&id).await.unwrap();

        assert_eq!(repo.get(&id).await.unwrap(), None);
        assert!(!repo.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_where_evicts_each_match() {
        let (repo, _spy) = cached(CachingStrategy::Standard);
        let kid = repo.add(person("Kid", 10)).await.unwrap();
        let adult = repo.add(person("Adult", 30)).await.unwrap();

        let removed = repo.remove_where(&Filter::lt("age", 18)).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(repo.get(&kid.id).await.unwrap(), None);
        assert_eq!(repo.get(&adult.id).await.unwrap(), Some(adult));
    }

    #[tokio::test]
    async fn test_failed_range_write_drops_cached_entries() {
        let (repo, spy) = cached(CachingStrategy::Standard);
        let kept = repo.add(person("Kept", 30)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.get(&kept.id).await.unwrap(), Some(kept.clone()));
        let reads = spy.calls.reads();

        let result = repo
            .remove_range(vec![kept.clone(), persisted("Ghost", 1)])
            .await;

        assert!(result.is_err());
        assert_eq!(repo.get(&kept.id).await.unwrap(), Some(kept.clone()));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(
            repo.find_many(&Filter::All, None).await.unwrap(),
            vec![kept]
        );
        assert_eq!(spy.calls.reads(), reads + 3);
    }

    #[tokio::test]
    async fn test_failed_add_range_drops_query_entries() {
        let (repo, spy) = cached(CachingStrategy::Standard);
        let existing = repo.add(persisted("Existing", 30)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        let reads = spy.calls.reads();

        let result = repo
            .add_range(vec![person("New", 20), existing])
            .await;

        assert!(result.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(spy.calls.reads(), reads + 1);
    }

    #[tokio::test]
    async fn test_no_caching_always_reaches_inner() {
        let (repo, spy) = cached(CachingStrategy::NoCaching);

        let added = repo.add(person("Tester", 30)).await.unwrap();
        repo.get(&added.id).await.unwrap();
        repo.count().await.unwrap();
        repo.count().await.unwrap();

        assert_eq!(spy.calls.reads(), 3);
    }

    #[tokio::test]
    async fn test_cache_outage_falls_back_to_inner() {
        let (repo, spy) = cached_with(
            CachingStrategy::Standard,
            CachingProvider::new(Arc::new(FailingCache)),
        );

        let added = repo.add(person("Tester", 30)).await.unwrap();
        assert_eq!(repo.get(&added.id).await.unwrap(), Some(added));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);

        assert_eq!(spy.calls.reads(), 3);
    }

    #[tokio::test]
    async fn test_timeout_strategy_caches_until_expiry() {
        let (repo, spy) = cached(CachingStrategy::Timeout {
            expiration: Duration::from_secs(60),
            generational: false,
        });

        assert_eq!(repo.count().await.unwrap(), 0);
        repo.add(person("Tester", 30)).await.unwrap();

        // No generation bump: the stale count stays until it expires.
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(spy.calls.reads(), 1);
    }

    #[tokio::test]
    async fn test_unit_of_work_invalidates_instead_of_writing_through() {
        let store = InMemoryStore::new();
        let buffer = Arc::new(CommandBuffer::deferred());
        buffer.configure(RepositoryName::default(), store);
        let storage: Arc<dyn Repository<Person>> =
            Arc::new(DocumentRepository::<Person, _>::new(buffer.clone()));
        let repo = CachingRepository::new(
            storage,
            repository_cache(CachingStrategy::Standard, CachingProvider::memory(256)),
            buffer.clone(),
        );

        let added = repo.add(person("Tester", 30)).await.unwrap();
        assert_eq!(repo.get(&added.id).await.unwrap(), None);
        assert_eq!(repo.count().await.unwrap(), 0);

        buffer.save_changes(&CancellationToken::new()).await.unwrap();

        assert_eq!(repo.get(&added.id).await.unwrap(), Some(added));
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
