//! Argument and lifecycle checks.
//!
//! Every call is checked before it goes further in: disposed repositories,
//! blank identities, empty batches, malformed filters and items in the wrong
//! transient state are rejected without any I/O.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::{AggregateRoot, EntityKey};
use repokit_core::query::{validate_field, Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, RepositoryError, Result};

pub struct GuardRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
}

impl<T: AggregateRoot> GuardRepository<T> {
    pub fn new(inner: Arc<dyn Repository<T>>) -> Self {
        Self { inner }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.is_disposed() {
            Err(RepositoryError::Disposed)
        } else {
            Ok(())
        }
    }
}

fn check_id<K: EntityKey>(id: &K) -> Result<()> {
    if id.is_blank() {
        return Err(RepositoryError::invalid_argument("id", "must not be empty"));
    }
    Ok(())
}

fn check_filter(filter: &Filter) -> Result<()> {
    filter
        .validate()
        .map_err(|message| RepositoryError::invalid_argument("filter", message))
}

fn check_selector(selector: &Selector) -> Result<()> {
    selector
        .validate()
        .map_err(|message| RepositoryError::invalid_argument("selector", message))
}

fn check_options(options: Option<&QueryOptions>) -> Result<()> {
    match options {
        Some(options) => options
            .validate()
            .map_err(|message| RepositoryError::invalid_argument("options", message)),
        None => Ok(()),
    }
}

fn check_field(field: &str) -> Result<()> {
    validate_field(field).map_err(|message| RepositoryError::invalid_argument("field", message))
}

fn check_range<T>(items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Err(RepositoryError::invalid_argument("items", "must not be empty"));
    }
    Ok(())
}

fn check_transient<T: AggregateRoot>(item: &T) -> Result<()> {
    if !item.is_transient() {
        return Err(RepositoryError::invalid_argument(
            "item",
            format!("{} {} already has an identity", T::TYPE_NAME, item.id()),
        ));
    }
    Ok(())
}

fn check_persisted<T: AggregateRoot>(item: &T) -> Result<()> {
    if item.is_transient() {
        return Err(RepositoryError::invalid_argument(
            "item",
            format!("{} has no identity yet", T::TYPE_NAME),
        ));
    }
    check_id(item.id())
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for GuardRepository<T> {
    async fn add(&self, item: T) -> Result<T> {
        self.ensure_live()?;
        check_transient(&item)?;
        self.inner.add(item).await
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.ensure_live()?;
        check_range(&items)?;
        items.iter().try_for_each(check_transient)?;
        self.inner.add_range(items).await
    }

    async fn update(&self, item: T) -> Result<T> {
        self.ensure_live()?;
        check_persisted(&item)?;
        self.inner.update(item).await
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.ensure_live()?;
        check_range(&items)?;
        items.iter().try_for_each(check_persisted)?;
        self.inner.update_range(items).await
    }

    async fn remove(&self, item: T) -> Result<T> {
        self.ensure_live()?;
        check_persisted(&item)?;
        self.inner.remove(item).await
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        self.ensure_live()?;
        check_id(id)?;
        self.inner.remove_by_id(id).await
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        self.ensure_live()?;
        check_filter(filter)?;
        self.inner.remove_where(filter).await
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.ensure_live()?;
        check_range(&items)?;
        items.iter().try_for_each(check_persisted)?;
        self.inner.remove_range(items).await
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        self.ensure_live()?;
        check_id(id)?;
        self.inner.get(id).await
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        self.ensure_live()?;
        check_id(id)?;
        check_selector(selector)?;
        self.inner.get_projection(id, selector).await
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        self.ensure_live()?;
        check_id(id)?;
        self.inner.exists(id).await
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        self.ensure_live()?;
        check_filter(filter)?;
        self.inner.exists_where(filter).await
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        self.ensure_live()?;
        check_filter(filter)?;
        check_options(options)?;
        self.inner.find_one(filter, options).await
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        self.ensure_live()?;
        check_filter(filter)?;
        check_selector(selector)?;
        check_options(options)?;
        self.inner.find_one_projection(filter, selector, options).await
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        self.ensure_live()?;
        check_filter(filter)?;
        check_options(options)?;
        self.inner.find_many(filter, options).await
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        self.ensure_live()?;
        check_filter(filter)?;
        check_selector(selector)?;
        check_options(options)?;
        self.inner.find_many_projection(filter, selector, options).await
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_live()?;
        self.inner.count().await
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        self.ensure_live()?;
        check_filter(filter)?;
        self.inner.count_where(filter).await
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        self.ensure_live()?;
        check_field(field)?;
        check_filter(filter)?;
        self.inner.sum(field, filter).await
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        self.ensure_live()?;
        check_field(field)?;
        check_filter(filter)?;
        self.inner.average(field, filter).await
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
    use super::*;
    use crate::fixtures::{person, persisted, Person, SpyRepository};
    use uuid::Uuid;

    fn guarded() -> (GuardRepository<Person>, Arc<SpyRepository<Person>>) {
        let spy = Arc::new(SpyRepository::<Person>::new());
        (GuardRepository::new(spy.clone()), spy)
    }

    #[tokio::test]
    async fn test_add_of_persisted_item_is_rejected() {
        let (repo, spy) = guarded();

        let result = repo.add(persisted("Tester", 30)).await;

        assert!(matches!(
            result,
            Err(RepositoryError::InvalidArgument { parameter: "item", .. })
        ));
        assert_eq!(spy.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_update_and_remove_of_transient_item_are_rejected() {
        let (repo, spy) = guarded();

        assert!(repo.update(person("Tester", 30)).await.is_err());
        assert!(repo.remove(person("Tester", 30)).await.is_err());
        assert!(repo
            .remove_range(vec![persisted("A", 1), person("B", 2)])
            .await
            .is_err());
        assert_eq!(spy.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_blank_ids_and_empty_ranges_are_rejected() {
        let (repo, spy) = guarded();

        assert!(repo.get(&Uuid::nil()).await.is_err());
        assert!(repo.exists(&Uuid::nil()).await.is_err());
        assert!(repo.remove_by_id(&Uuid::nil()).await.is_err());
        assert!(repo.add_range(Vec::new()).await.is_err());
        assert_eq!(spy.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_malformed_queries_are_rejected() {
        let (repo, spy) = guarded();

        assert!(repo.count_where(&Filter::eq("", 1)).await.is_err());
        assert!(repo
            .find_many(&Filter::All, Some(&QueryOptions::new().page(0, 10)))
            .await
            .is_err());
        assert!(repo
            .find_many_projection(&Filter::All, &Selector::fields(Vec::<String>::new()), None)
            .await
            .is_err());
        assert!(repo.sum("", &Filter::All).await.is_err());
        assert_eq!(spy.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_valid_calls_pass_through() {
        let (repo, spy) = guarded();

        let added = repo.add(person("Tester", 30)).await.unwrap();
        repo.get(&added.id).await.unwrap();

        assert_eq!(spy.calls.adds(), 1);
        assert_eq!(spy.calls.reads(), 1);
    }

    #[tokio::test]
    async fn test_calls_after_dispose_are_rejected() {
        let (repo, spy) = guarded();

        repo.dispose();

        assert!(repo.is_disposed());
        assert_eq!(repo.count().await, Err(RepositoryError::Disposed));
        assert_eq!(
            repo.add(person("Tester", 30)).await.map(|_| ()),
            Err(RepositoryError::Disposed)
        );
        assert_eq!(spy.calls.total(), 0);
    }
}
