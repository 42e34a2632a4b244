//! Test aggregates and hand-written doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use repokit_core::cache::{Cache, CacheError};
use repokit_core::entity::{AggregateRoot, DomainEvent, DomainEvents};
use repokit_core::options::RepositoryName;
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, Result};

use crate::context::CommandBuffer;
use crate::storage::{DocumentRepository, InMemoryStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    #[serde(skip)]
    pub events: DomainEvents,
}

impl AggregateRoot for Person {
    type Key = Uuid;
    const TYPE_NAME: &'static str = "Person";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn events(&self) -> &DomainEvents {
        &self.events
    }

    fn events_mut(&mut self) -> &mut DomainEvents {
        &mut self.events
    }
}

/// A transient person.
pub fn person(name: &str, age: u32) -> Person {
    Person {
        id: Uuid::nil(),
        name: name.to_string(),
        age,
        events: DomainEvents::new(),
    }
}

/// A person that already has an identity.
pub fn persisted(name: &str, age: u32) -> Person {
    Person {
        id: Uuid::new_v4(),
        ..person(name, age)
    }
}

#[derive(Debug, Clone)]
pub struct PersonRenamed {
    pub name: String,
}

impl PersonRenamed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl DomainEvent for PersonRenamed {
    fn name(&self) -> &'static str {
        "PersonRenamed"
    }
}

/// Aggregate with an integer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub label: String,
    #[serde(skip)]
    pub events: DomainEvents,
}

impl Ticket {
    pub fn new(label: &str) -> Self {
        Self {
            id: 0,
            label: label.to_string(),
            events: DomainEvents::new(),
        }
    }
}

impl AggregateRoot for Ticket {
    type Key = i64;
    const TYPE_NAME: &'static str = "Ticket";

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn events(&self) -> &DomainEvents {
        &self.events
    }

    fn events_mut(&mut self) -> &mut DomainEvents {
        &mut self.events
    }
}

/// Cache backend whose every call fails.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> repokit_core::cache::Result<Option<Vec<u8>>> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: &[u8],
        _ttl: Option<Duration>,
    ) -> repokit_core::cache::Result<()> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn delete(&self, _key: &str) -> repokit_core::cache::Result<()> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn exists(&self, _key: &str) -> repokit_core::cache::Result<bool> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn increment(&self, _key: &str, _delta: i64) -> repokit_core::cache::Result<i64> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }
}

/// Immediate-mode storage repository over a fresh in-memory store.
pub fn storage<T: AggregateRoot>() -> DocumentRepository<T, InMemoryStore> {
    let context = CommandBuffer::immediate();
    context.configure(RepositoryName::default(), InMemoryStore::new());
    DocumentRepository::new(Arc::new(context))
}

/// Calls that reached a [`SpyRepository`].
#[derive(Debug, Default)]
pub struct CallCounter {
    pub adds: AtomicUsize,
    pub updates: AtomicUsize,
    pub removes: AtomicUsize,
    pub reads: AtomicUsize,
}

impl CallCounter {
    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.adds() + self.updates() + self.removes() + self.reads()
    }
}

/// Storage repository that counts every call it receives.
pub struct SpyRepository<T: AggregateRoot> {
    inner: DocumentRepository<T, InMemoryStore>,
    pub calls: Arc<CallCounter>,
}

impl<T: AggregateRoot> SpyRepository<T> {
    pub fn new() -> Self {
        Self {
            inner: storage(),
            calls: Arc::new(CallCounter::default()),
        }
    }

    fn hit(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for SpyRepository<T> {
    async fn add(&self, item: T) -> Result<T> {
        Self::hit(&self.calls.adds);
        self.inner.add(item).await
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        Self::hit(&self.calls.adds);
        self.inner.add_range(items).await
    }

    async fn update(&self, item: T) -> Result<T> {
        Self::hit(&self.calls.updates);
        self.inner.update(item).await
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        Self::hit(&self.calls.updates);
        self.inner.update_range(items).await
    }

    async fn remove(&self, item: T) -> Result<T> {
        Self::hit(&self.calls.removes);
        self.inner.remove(item).await
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        Self::hit(&self.calls.removes);
        self.inner.remove_by_id(id).await
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        Self::hit(&self.calls.removes);
        self.inner.remove_where(filter).await
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        Self::hit(&self.calls.removes);
        self.inner.remove_range(items).await
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        Self::hit(&self.calls.reads);
        self.inner.get(id).await
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        Self::hit(&self.calls.reads);
        self.inner.get_projection(id, selector).await
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        Self::hit(&self.calls.reads);
        self.inner.exists(id).await
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        Self::hit(&self.calls.reads);
        self.inner.exists_where(filter).await
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        Self::hit(&self.calls.reads);
        self.inner.find_one(filter, options).await
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        Self::hit(&self.calls.reads);
        self.inner.find_one_projection(filter, selector, options).await
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        Self::hit(&self.calls.reads);
        self.inner.find_many(filter, options).await
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        Self::hit(&self.calls.reads);
        self.inner.find_many_projection(filter, selector, options).await
    }

    async fn count(&self) -> Result<usize> {
        Self::hit(&self.calls.reads);
        self.inner.count().await
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        Self::hit(&self.calls.reads);
        self.inner.count_where(filter).await
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        Self::hit(&self.calls.reads);
        self.inner.sum(field, filter).await
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        Self::hit(&self.calls.reads);
        self.inner.average(field, filter).await
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }
}
