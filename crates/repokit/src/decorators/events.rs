//! Domain events decorator.
//!
//! Events queued on an aggregate go to before-commit handlers ahead of the
//! write. Once the inner write succeeded they go, together with a synthetic
//! added / updated / removed event, to committed handlers. The returned
//! aggregate has an empty event queue.
//!
//! Removals by id or filter need the aggregates before the write. They are
//! looked up in the source repository, the storage layer once the pipeline
//! is built, so a cached query result never decides what gets removed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::{AggregateRoot, DomainEvent, EntityAdded, EntityRemoved, EntityUpdated};
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, Result};

use crate::events::{DomainEventDispatcher, EventPhase};

type Events = Vec<Arc<dyn DomainEvent>>;

pub struct DomainEventsRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
    source: Arc<dyn Repository<T>>,
    dispatcher: DomainEventDispatcher,
    enabled: bool,
}

impl<T: AggregateRoot> DomainEventsRepository<T> {
    pub fn new(inner: Arc<dyn Repository<T>>, dispatcher: DomainEventDispatcher, enabled: bool) -> Self {
        Self {
            source: inner.clone(),
            inner,
            dispatcher,
            enabled,
        }
    }

    /// Looks up removal targets in `source` instead of the inner layer.
    pub fn resolving_from(mut self, source: Arc<dyn Repository<T>>) -> Self {
        self.source = source;
        self
    }

    /// Takes the queued events off every item and runs the before-commit
    /// handlers on them.
    async fn before_commit(&self, items: &mut [T]) -> Result<Events> {
        let queued: Events = items
            .iter_mut()
            .flat_map(|item| item.events_mut().take())
            .collect();
        self.dispatcher
            .dispatch(EventPhase::BeforeCommit, &queued)
            .await?;
        Ok(queued)
    }

    /// Runs the committed handlers on the queued events followed by one
    /// synthetic event per affected item.
    async fn committed<E, F>(&self, mut events: Events, items: &[T], synthetic: F) -> Result<()>
    where
        E: DomainEvent,
        F: Fn(T) -> E + Send + Sync,
    {
        if !self.dispatcher.has_handlers(EventPhase::Committed) {
            return Ok(());
        }
        events.extend(
            items
                .iter()
                .map(|item| Arc::new(synthetic(item.clone())) as Arc<dyn DomainEvent>),
        );
        self.dispatcher
            .dispatch(EventPhase::Committed, &events)
            .await
    }

    fn cleared(mut items: Vec<T>) -> Vec<T> {
        for item in &mut items {
            item.events_mut().clear();
        }
        items
    }
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for DomainEventsRepository<T> {
    async fn add(&self, mut item: T) -> Result<T> {
        if !self.enabled {
            return self.inner.add(item).await;
        }
        let queued = self.before_commit(std::slice::from_mut(&mut item)).await?;
        let mut added = self.inner.add(item).await?;
        added.events_mut().clear();
        self.committed(queued, std::slice::from_ref(&added), EntityAdded::new)
            .await?;
        Ok(added)
    }

    async fn add_range(&self, mut items: Vec<T>) -> Result<Vec<T>> {
        if !self.enabled {
            return self.inner.add_range(items).await;
        }
        let queued = self.before_commit(&mut items).await?;
        let added = Self::cleared(self.inner.add_range(items).await?);
        self.committed(queued, &added, EntityAdded::new).await?;
        Ok(added)
    }

    async fn update(&self, mut item: T) -> Result<T> {
        if !self.enabled {
            return self.inner.update(item).await;
        }
        let queued = self.before_commit(std::slice::from_mut(&mut item)).await?;
        let mut updated = self.inner.update(item).await?;
        updated.events_mut().clear();
        self.committed(queued, std::slice::from_ref(&updated), EntityUpdated::new)
            .await?;
        Ok(updated)
    }

    async fn update_range(&self, mut items: Vec<T>) -> Result<Vec<T>> {
        if !self.enabled {
            return self.inner.update_range(items).await;
        }
        let queued = self.before_commit(&mut items).await?;
        let updated = Self::cleared(self.inner.update_range(items).await?);
        self.committed(queued, &updated, EntityUpdated::new).await?;
        Ok(updated)
    }

    async fn remove(&self, mut item: T) -> Result<T> {
        if !self.enabled {
            return self.inner.remove(item).await;
        }
        let queued = self.before_commit(std::slice::from_mut(&mut item)).await?;
        // The inner call resets the key; the event keeps the old one.
        let snapshot = item.clone();
        let mut removed = self.inner.remove(item).await?;
        removed.events_mut().clear();
        self.committed(queued, std::slice::from_ref(&snapshot), EntityRemoved::new)
            .await?;
        Ok(removed)
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        if !self.enabled {
            return self.inner.remove_by_id(id).await;
        }
        match self.source.get(id).await? {
            Some(item) => self.remove(item).await.map(|_| ()),
            None => self.inner.remove_by_id(id).await,
        }
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        if !self.enabled {
            return self.inner.remove_where(filter).await;
        }
        let mut items = self.source.find_many(filter, None).await?;
        if items.is_empty() {
            return Ok(0);
        }
        let queued = self.before_commit(&mut items).await?;
        let snapshot = items.clone();
        let removed = self.inner.remove_range(items).await?.len();
        self.committed(queued, &snapshot, EntityRemoved::new).await?;
        Ok(removed)
    }

    async fn remove_range(&self, mut items: Vec<T>) -> Result<Vec<T>> {
        if !self.enabled {
            return self.inner.remove_range(items).await;
        }
        let queued = self.before_commit(&mut items).await?;
        let snapshot = items.clone();
        let removed = Self::cleared(self.inner.remove_range(items).await?);
        self.committed(queued, &snapshot, EntityRemoved::new).await?;
        Ok(removed)
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

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::fixtures::{person, Person, PersonRenamed, SpyRepository};
    use repokit_core::storage::RepositoryError;
    use uuid::Uuid;

    /// Records the name of every event a phase sees.
    fn recorder(dispatcher: &DomainEventDispatcher, phase: EventPhase) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.subscribe(phase, move |event: Arc<dyn DomainEvent>| {
            let sink = sink.clone();
            async move {
                let label = match event.downcast_ref::<EntityRemoved<Person>>() {
                    Some(removed) => format!("EntityRemoved:{}", removed.entity.id),
                    None => event.name().to_string(),
                };
                sink.lock().unwrap().push(label);
                Ok::<_, anyhow::Error>(())
            }
        });
        seen
    }

    fn with_events() -> (DomainEventsRepository<Person>, DomainEventDispatcher) {
        let dispatcher = DomainEventDispatcher::new();
        let spy: Arc<dyn Repository<Person>> = Arc::new(SpyRepository::<Person>::new());
        (DomainEventsRepository::new(spy, dispatcher.clone(), true), dispatcher)
    }

    #[tokio::test]
    async fn test_add_dispatches_queued_then_synthetic_events() {
        let (repo, dispatcher) = with_events();
        let before = recorder(&dispatcher, EventPhase::BeforeCommit);
        let committed = recorder(&dispatcher, EventPhase::Committed);
        let mut item = person("Tester", 30);
        item.events.push(PersonRenamed::new("Tester"));

        let added = repo.add(item).await.unwrap();

        assert!(added.events.is_empty());
        assert_eq!(*before.lock().unwrap(), vec!["PersonRenamed"]);
        assert_eq!(
            *committed.lock().unwrap(),
            vec!["PersonRenamed", "EntityAdded"]
        );
    }

    #[tokio::test]
    async fn test_remove_by_id_event_carries_identity() {
        let (repo, dispatcher) = with_events();
        let added = repo.add(person("Tester", 30)).await.unwrap();
        let committed = recorder(&dispatcher, EventPhase::Committed);

        repo.remove_by_id(&added.id).await.unwrap();

        assert_eq!(
            *committed.lock().unwrap(),
            vec![format!("EntityRemoved:{}", added.id)]
        );
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_by_missing_id_fails_without_events() {
        let (repo, dispatcher) = with_events();
        let committed = recorder(&dispatcher, EventPhase::Committed);

        let result = repo.remove_by_id(&Uuid::new_v4()).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
        assert!(committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_where_resolves_items_first() {
        let (repo, dispatcher) = with_events();
        let kid = repo.add(person("Kid", 10)).await.unwrap();
        repo.add(person("Adult", 30)).await.unwrap();
        let committed = recorder(&dispatcher, EventPhase::Committed);

        let removed = repo.remove_where(&Filter::lt("age", 18)).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(
            *committed.lock().unwrap(),
            vec![format!("EntityRemoved:{}", kid.id)]
        );
    }

    #[tokio::test]
    async fn test_failing_before_commit_handler_blocks_write() {
        let dispatcher = DomainEventDispatcher::new();
        let spy = Arc::new(SpyRepository::<Person>::new());
        let repo = DomainEventsRepository::new(spy.clone(), dispatcher.clone(), true);
        dispatcher.subscribe(EventPhase::BeforeCommit, |_event: Arc<dyn DomainEvent>| async {
            Err::<(), _>(anyhow::anyhow!("not now"))
        });
        let mut item = person("Tester", 30);
        item.events.push(PersonRenamed::new("Tester"));

        let result = repo.add(item).await;

        assert!(matches!(result, Err(RepositoryError::EventHandler(_))));
        assert_eq!(spy.calls.adds(), 0);
    }
}
