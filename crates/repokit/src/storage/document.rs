//! Generic storage repository over a JSON document store.
//!
//! Writes become [`DocumentCommand`]s routed through the repository's
//! [`CommandBuffer`], so the same code serves immediate and unit of work
//! modes. Reads go straight to the store and do not see buffered writes.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use repokit_core::entity::{AggregateRoot, KeyGenerator};
use repokit_core::query::evaluate::{
    average_field, from_document, select, sum_field, to_document,
};
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, RepositoryError, Result};

use crate::context::{CommandBuffer, TransactionalBackend};

/// One buffered write against a document collection.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentCommand {
    /// Fails with `AlreadyExists` if the id is taken.
    Insert {
        collection: &'static str,
        id: String,
        document: Value,
    },
    /// Fails with `NotFound` if the id is missing.
    Replace {
        collection: &'static str,
        id: String,
        document: Value,
    },
    /// Fails with `NotFound` if the id is missing.
    Delete { collection: &'static str, id: String },
}

/// Integer key sequences of one store, one per collection.
///
/// Clones share the counters, so every repository over the same store draws
/// keys from the same sequence. A sequence is seeded from the stored rows the
/// first time it is used.
#[derive(Debug, Clone, Default)]
pub struct KeySequences {
    collections: Arc<Mutex<HashMap<&'static str, Arc<OnceCell<KeyGenerator>>>>>,
}

impl KeySequences {
    fn slot(&self, collection: &'static str) -> Arc<OnceCell<KeyGenerator>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection)
            .or_default()
            .clone()
    }
}

/// A backend that stores aggregates as JSON documents grouped by collection.
#[async_trait]
pub trait DocumentStore: TransactionalBackend<Command = DocumentCommand> + Clone {
    /// Key sequences shared by every handle to this store.
    fn sequences(&self) -> &KeySequences;

    async fn load(&self, collection: &'static str, id: &str) -> Result<Option<Value>>;

    /// Every document of a collection, in insertion order.
    async fn load_all(&self, collection: &'static str) -> Result<Vec<Value>>;

    async fn count(&self, collection: &'static str) -> Result<usize>;
}

/// Storage repository for aggregate `T` over store `S`.
pub struct DocumentRepository<T: AggregateRoot, S: DocumentStore> {
    context: Arc<CommandBuffer<S>>,
    generator: KeyGenerator,
    disposed: AtomicBool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: AggregateRoot, S: DocumentStore> DocumentRepository<T, S> {
    /// Creates a repository writing through `context`.
    ///
    /// The key generator is picked once here from `T::Key`. Integer keys
    /// come from the store's shared sequence instead.
    pub fn new(context: Arc<CommandBuffer<S>>) -> Self {
        Self {
            context,
            generator: KeyGenerator::for_key::<T::Key>(),
            disposed: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    fn store(&self) -> Result<&S> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RepositoryError::Disposed);
        }
        self.context.backend()
    }

    /// The generator for new keys. Integer sequences live in the store and
    /// start after the highest key already stored.
    async fn key_generator(&self) -> Result<KeyGenerator> {
        let store = self.store()?;
        if !self.generator.is_sequence() {
            return Ok(self.generator.clone());
        }

        let slot = store.sequences().slot(T::TYPE_NAME);
        let generator = slot
            .get_or_try_init(|| async {
                let generator = KeyGenerator::for_key::<T::Key>();
                for document in store.load_all(T::TYPE_NAME).await? {
                    let entity: T = from_document(document)?;
                    if let Some(last) = to_document(entity.id())?.as_i64() {
                        generator.observe(last);
                    }
                }
                tracing::debug!(entity_type = T::TYPE_NAME, "Key sequence seeded");
                Ok::<_, RepositoryError>(generator)
            })
            .await?;
        Ok(generator.clone())
    }

    /// Assigns a key to transient items and builds the insert.
    fn insert(generator: &KeyGenerator, item: &mut T) -> Result<DocumentCommand> {
        if item.is_transient() {
            item.set_id(generator.generate()?);
        } else if let Some(explicit) = to_document(item.id())?.as_i64() {
            generator.observe(explicit);
        }

        Ok(DocumentCommand::Insert {
            collection: T::TYPE_NAME,
            id: item.id().to_string(),
            document: to_document(item)?,
        })
    }

    fn replace(item: &T) -> Result<DocumentCommand> {
        Ok(DocumentCommand::Replace {
            collection: T::TYPE_NAME,
            id: item.id().to_string(),
            document: to_document(item)?,
        })
    }

    fn delete(id: &T::Key) -> DocumentCommand {
        DocumentCommand::Delete {
            collection: T::TYPE_NAME,
            id: id.to_string(),
        }
    }

    async fn matching(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<Value>> {
        let documents = self.store()?.load_all(T::TYPE_NAME).await?;
        Ok(select(documents, filter, options))
    }

    fn decode_all(documents: Vec<Value>) -> Result<Vec<T>> {
        documents.into_iter().map(from_document).collect()
    }
}

#[async_trait]
impl<T: AggregateRoot, S: DocumentStore> Repository<T> for DocumentRepository<T, S> {
    // ========================================================================
    // Writes
    // ========================================================================

    async fn add(&self, mut item: T) -> Result<T> {
        let generator = self.key_generator().await?;
        let command = Self::insert(&generator, &mut item)?;
        self.context.add_command(command).await?;
        Ok(item)
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        let generator = self.key_generator().await?;
        let mut added = Vec::with_capacity(items.len());
        let mut commands = Vec::with_capacity(items.len());
        for mut item in items {
            commands.push(Self::insert(&generator, &mut item)?);
            added.push(item);
        }
        self.context.add_commands(commands).await?;
        Ok(added)
    }

    async fn update(&self, item: T) -> Result<T> {
        self.store()?;
        self.context.add_command(Self::replace(&item)?).await?;
        Ok(item)
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.store()?;
        let commands = items.iter().map(Self::replace).collect::<Result<Vec<_>>>()?;
        self.context.add_commands(commands).await?;
        Ok(items)
    }

    async fn remove(&self, mut item: T) -> Result<T> {
        self.remove_by_id(item.id()).await?;
        item.reset_id();
        Ok(item)
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        self.store()?;
        self.context.add_command(Self::delete(id)).await
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        let items = Self::decode_all(self.matching(filter, None).await?)?;
        let commands: Vec<_> = items.iter().map(|item| Self::delete(item.id())).collect();
        let count = commands.len();
        self.context.add_commands(commands).await?;
        Ok(count)
    }

    async fn remove_range(&self, mut items: Vec<T>) -> Result<Vec<T>> {
        self.store()?;
        let commands = items.iter().map(|item| Self::delete(item.id())).collect();
        self.context.add_commands(commands).await?;
        for item in &mut items {
            item.reset_id();
        }
        Ok(items)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        self.store()?
            .load(T::TYPE_NAME, &id.to_string())
            .await?
            .map(from_document)
            .transpose()
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        let document = self.store()?.load(T::TYPE_NAME, &id.to_string()).await?;
        Ok(document.map(|document| selector.apply(&document)))
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        let document = self.store()?.load(T::TYPE_NAME, &id.to_string()).await?;
        Ok(document.is_some())
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        Ok(!self.matching(filter, None).await?.is_empty())
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        self.matching(filter, options)
            .await?
            .into_iter()
            .next()
            .map(from_document)
            .transpose()
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        Ok(self
            .matching(filter, options)
            .await?
            .first()
            .map(|document| selector.apply(document)))
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        Self::decode_all(self.matching(filter, options).await?)
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        Ok(self
            .matching(filter, options)
            .await?
            .iter()
            .map(|document| selector.apply(document))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.store()?.count(T::TYPE_NAME).await
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        if filter.is_all() {
            return self.count().await;
        }
        Ok(self.matching(filter, None).await?.len())
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        sum_field(&self.matching(filter, None).await?, field)
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        average_field(&self.matching(filter, None).await?, field)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!(entity_type = T::TYPE_NAME, "Storage repository disposed");
        }
    }
}
