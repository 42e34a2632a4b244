//! Validation decorator.
//!
//! Items are validated before add and update; every failure across every
//! item is reported in one `RepositoryError::Validation`. Reads and removals
//! pass through.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::AggregateRoot;
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, Result};
use repokit_core::validation::ValidationStrategy;

pub struct ValidationRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
    strategy: ValidationStrategy<T>,
    enabled: bool,
}

impl<T: AggregateRoot> ValidationRepository<T> {
    pub fn new(inner: Arc<dyn Repository<T>>, strategy: ValidationStrategy<T>, enabled: bool) -> Self {
        Self {
            inner,
            strategy,
            enabled,
        }
    }

    fn check(&self, items: &[T]) -> Result<()> {
        if !self.enabled || self.strategy.is_empty() {
            return Ok(());
        }
        self.strategy.validate_all(items).map_err(|errors| {
            tracing::debug!(
                entity_type = T::TYPE_NAME,
                failures = errors.failures.len(),
                "Validation failed"
            );
            errors.into()
        })
    }
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for ValidationRepository<T> {
    async fn add(&self, item: T) -> Result<T> {
        self.check(std::slice::from_ref(&item))?;
        self.inner.add(item).await
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.check(&items)?;
        self.inner.add_range(items).await
    }

    async fn update(&self, item: T) -> Result<T> {
        self.check(std::slice::from_ref(&item))?;
        self.inner.update(item).await
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.check(&items)?;
        self.inner.update_range(items).await
    }

    async fn remove(&self, item: T) -> Result<T> {
        self.inner.remove(item).await
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        self.inner.remove_by_id(id).await
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        self.inner.remove_where(filter).await
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.inner.remove_range(items).await
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        self.inner.get(id).await
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        self.inner.get_projection(id, selector).await
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        self.inner.exists(id).await
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        self.inner.exists_where(filter).await
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        self.inner.find_one(filter, options).await
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        self.inner
            .find_one_projection(filter, selector, options)
            .await
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        self.inner.find_many(filter, options).await
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        self.inner
            .find_many_projection(filter, selector, options)
            .await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        self.inner.count_where(filter).await
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        self.inner.sum(field, filter).await
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        self.inner.average(field, filter).await
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }
}
