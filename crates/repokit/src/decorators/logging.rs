//! Exception logging decorator.
//!
//! Logs every failed call at critical severity and returns the error
//! untouched. Never recovers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::AggregateRoot;
use repokit_core::options::RepositoryName;
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, Result};

pub struct LoggingRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
    repository: RepositoryName,
}

impl<T: AggregateRoot> LoggingRepository<T> {
    pub fn new(inner: Arc<dyn Repository<T>>, repository: RepositoryName) -> Self {
        Self { inner, repository }
    }

    fn observe<R>(&self, operation: &'static str, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            tracing::error!(
                severity = "critical",
                repository = %self.repository,
                entity_type = T::TYPE_NAME,
                operation,
                error = %e,
                "Repository operation failed"
            );
        }
        result
    }
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for LoggingRepository<T> {
    async fn add(&self, item: T) -> Result<T> {
        self.observe("add", self.inner.add(item).await)
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.observe("add_range", self.inner.add_range(items).await)
    }

    async fn update(&self, item: T) -> Result<T> {
        self.observe("update", self.inner.update(item).await)
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.observe("update_range", self.inner.update_range(items).await)
    }

    async fn remove(&self, item: T) -> Result<T> {
        self.observe("remove", self.inner.remove(item).await)
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        self.observe("remove_by_id", self.inner.remove_by_id(id).await)
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        self.observe("remove_where", self.inner.remove_where(filter).await)
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.observe("remove_range", self.inner.remove_range(items).await)
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        self.observe("get", self.inner.get(id).await)
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        self.observe("get_projection", self.inner.get_projection(id, selector).await)
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        self.observe("exists", self.inner.exists(id).await)
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        self.observe("exists_where", self.inner.exists_where(filter).await)
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        self.observe("find_one", self.inner.find_one(filter, options).await)
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        let result = self
            .inner
            .find_one_projection(filter, selector, options)
            .await;
        self.observe("find_one_projection", result)
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        self.observe("find_many", self.inner.find_many(filter, options).await)
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        let result = self
            .inner
            .find_many_projection(filter, selector, options)
            .await;
        self.observe("find_many_projection", result)
    }

    async fn count(&self) -> Result<usize> {
        self.observe("count", self.inner.count().await)
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        self.observe("count_where", self.inner.count_where(filter).await)
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        self.observe("sum", self.inner.sum(field, filter).await)
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        self.observe("average", self.inner.average(field, filter).await)
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }

    async fn dispose_async(&self) -> Result<()> {
        self.observe("dispose", self.inner.dispose_async().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{persisted, Person, SpyRepository};
    use repokit_core::storage::RepositoryError;

    #[tokio::test]
    async fn test_errors_are_returned_unchanged() {
        let spy = Arc::new(SpyRepository::<Person>::new());
        let repo = LoggingRepository::new(spy.clone(), RepositoryName::default());
        let ghost = persisted("Ghost", 1);
        let id = ghost.id;

        let result = repo.update(ghost).await;

        assert_eq!(
            result.map(|_| ()),
            Err(RepositoryError::not_found("Person", id))
        );
        assert_eq!(spy.calls.updates(), 1);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let spy = Arc::new(SpyRepository::<Person>::new());
        let repo = LoggingRepository::new(spy, RepositoryName::default());

        assert_eq!(repo.count().await, Ok(0));
    }
}
