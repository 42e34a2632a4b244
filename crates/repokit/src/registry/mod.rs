//! Named repository configuration and pipeline assembly.
//!
//! The registry is the composition root: it owns the options of every named
//! repository, the cache services and event dispatcher they share, and the
//! backend handles opened on their behalf.

mod builder;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use repokit_core::cache::CacheKeyProvider;
use repokit_core::entity::AggregateRoot;
use repokit_core::interception::RepositoryInterceptor;
use repokit_core::options::{BackendKind, RepositoryName, RepositoryOptions};
use repokit_core::storage::{Repository, RepositoryError, Result};
use repokit_core::validation::{ValidationStrategy, Validator};

use crate::cache::{CacheGenerations, CachingProvider, RepositoryCache};
use crate::context::{BufferMode, CommandBuffer, UnitOfWorkContext};
use crate::events::DomainEventDispatcher;
use crate::storage::{DocumentRepository, InMemoryStore};
#[cfg(feature = "sqlite")]
use crate::storage::SqliteStore;

pub use builder::PipelineBuilder;

type TypedSlots = RwLock<HashMap<(RepositoryName, TypeId), Box<dyn Any + Send + Sync>>>;

/// An opened storage backend. Clones share the same data.
#[derive(Debug, Clone)]
pub(crate) enum BackendHandle {
    InMemory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
}

/// A command buffer bound to one backend, in either mode.
#[derive(Debug, Clone)]
pub(crate) enum ContextHandle {
    InMemory(Arc<CommandBuffer<InMemoryStore>>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<CommandBuffer<SqliteStore>>),
}

impl ContextHandle {
    pub(crate) fn open(name: RepositoryName, backend: BackendHandle, mode: BufferMode) -> Self {
        match backend {
            BackendHandle::InMemory(store) => {
                let buffer = CommandBuffer::new(mode);
                buffer.configure(name, store);
                Self::InMemory(Arc::new(buffer))
            }
            #[cfg(feature = "sqlite")]
            BackendHandle::Sqlite(store) => {
                let buffer = CommandBuffer::new(mode);
                buffer.configure(name, store);
                Self::Sqlite(Arc::new(buffer))
            }
        }
    }

    pub(crate) fn as_context(&self) -> Arc<dyn UnitOfWorkContext> {
        match self {
            Self::InMemory(buffer) => buffer.clone(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(buffer) => buffer.clone(),
        }
    }

    /// Storage repository for `T` writing through this context.
    pub(crate) fn storage<T: AggregateRoot>(&self) -> Arc<dyn Repository<T>> {
        match self {
            Self::InMemory(buffer) => Arc::new(DocumentRepository::<T, _>::new(buffer.clone())),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(buffer) => Arc::new(DocumentRepository::<T, _>::new(buffer.clone())),
        }
    }
}

/// Key under which an opened backend is shared.
///
/// Named in-memory databases and SQLite files are shared across repository
/// names. Anonymous in-memory stores and `:memory:` databases belong to one
/// repository name.
fn backend_key(name: &RepositoryName, backend: &BackendKind) -> String {
    match backend {
        BackendKind::InMemory {
            database: Some(database),
        } => format!("inmemory:{database}"),
        BackendKind::InMemory { database: None } => format!("inmemory:@{name}"),
        BackendKind::Sqlite { path } if path == ":memory:" => format!("sqlite:@{name}"),
        BackendKind::Sqlite { path } => format!("sqlite:{path}"),
    }
}

pub struct RepositoryRegistry {
    repositories: HashMap<RepositoryName, RepositoryOptions>,
    generations: CacheGenerations,
    dispatcher: DomainEventDispatcher,
    validators: TypedSlots,
    interceptors: TypedSlots,
    backends: Mutex<HashMap<String, BackendHandle>>,
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("repositories", &self.repositories)
            .finish_non_exhaustive()
    }
}

impl RepositoryRegistry {
    pub fn new(provider: CachingProvider) -> Self {
        Self {
            repositories: HashMap::new(),
            generations: CacheGenerations::new(provider),
            dispatcher: DomainEventDispatcher::new(),
            validators: RwLock::new(HashMap::new()),
            interceptors: RwLock::new(HashMap::new()),
            backends: Mutex::new(HashMap::new()),
        }
    }

    /// Loads a JSON object mapping repository names to their options.
    pub fn from_json(json: &str, provider: CachingProvider) -> Result<Self> {
        let repositories: HashMap<RepositoryName, RepositoryOptions> =
            serde_json::from_str(json)
                .map_err(|e| RepositoryError::InvalidData(format!("repository options: {e}")))?;

        let mut registry = Self::new(provider);
        for (name, options) in repositories {
            registry.register(name, options);
        }
        Ok(registry)
    }

    pub fn with_repository(mut self, name: impl Into<RepositoryName>, options: RepositoryOptions) -> Self {
        self.register(name, options);
        self
    }

    pub fn register(&mut self, name: impl Into<RepositoryName>, options: RepositoryOptions) {
        let name = name.into();
        tracing::debug!(repository = %name, backend = ?options.backend, "Repository registered");
        self.repositories.insert(name, options);
    }

    pub fn options(&self, name: &RepositoryName) -> Result<&RepositoryOptions> {
        self.repositories
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownRepository(name.to_string()))
    }

    pub fn dispatcher(&self) -> &DomainEventDispatcher {
        &self.dispatcher
    }

    pub fn generations(&self) -> &CacheGenerations {
        &self.generations
    }

    /// Adds a validator for aggregate `T` in repository `name`.
    pub fn add_validator<T: AggregateRoot>(
        &self,
        name: impl Into<RepositoryName>,
        validator: impl Validator<T> + 'static,
    ) {
        let mut slots = self.validators.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry((name.into(), TypeId::of::<T>()))
            .or_insert_with(|| Box::new(ValidationStrategy::<T>::new()));
        if let Some(strategy) = slot.downcast_mut::<ValidationStrategy<T>>() {
            strategy.push(Arc::new(validator));
        }
    }

    /// Adds an interceptor for aggregate `T` in repository `name`. Hooks run
    /// in registration order.
    pub fn add_interceptor<T: AggregateRoot>(
        &self,
        name: impl Into<RepositoryName>,
        interceptor: Arc<dyn RepositoryInterceptor<T>>,
    ) {
        let mut slots = self.interceptors.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry((name.into(), TypeId::of::<T>()))
            .or_insert_with(|| Box::new(Vec::<Arc<dyn RepositoryInterceptor<T>>>::new()));
        if let Some(interceptors) = slot.downcast_mut::<Vec<Arc<dyn RepositoryInterceptor<T>>>>() {
            interceptors.push(interceptor);
        }
    }

    fn validators_for<T: AggregateRoot>(&self, name: &RepositoryName) -> ValidationStrategy<T> {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(name.clone(), TypeId::of::<T>()))
            .and_then(|slot| slot.downcast_ref::<ValidationStrategy<T>>())
            .cloned()
            .unwrap_or_default()
    }

    fn interceptors_for<T: AggregateRoot>(
        &self,
        name: &RepositoryName,
    ) -> Vec<Arc<dyn RepositoryInterceptor<T>>> {
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(name.clone(), TypeId::of::<T>()))
            .and_then(|slot| slot.downcast_ref::<Vec<Arc<dyn RepositoryInterceptor<T>>>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Full pipeline for `T` over a private immediate-mode context.
    ///
    /// Repositories configured for a unit of work must be resolved through
    /// [`UnitOfWork`](crate::context::UnitOfWork) instead.
    pub async fn repository<T: AggregateRoot>(
        &self,
        name: impl Into<RepositoryName>,
    ) -> Result<Arc<dyn Repository<T>>> {
        let name = name.into();
        let options = self.options(&name)?;
        if options.unit_of_work {
            return Err(RepositoryError::InvalidOperation(format!(
                "repository `{name}` requires a unit of work"
            )));
        }

        let backend = self.backend(&name, options).await?;
        let context = ContextHandle::open(name.clone(), backend, BufferMode::Immediate);
        Ok(self.pipeline::<T>(&name, options, &context))
    }

    /// Opens the backend for `name`, or returns the handle opened earlier.
    pub(crate) async fn backend(
        &self,
        name: &RepositoryName,
        options: &RepositoryOptions,
    ) -> Result<BackendHandle> {
        let key = backend_key(name, &options.backend);
        let mut backends = self.backends.lock().await;
        if let Some(handle) = backends.get(&key) {
            return Ok(handle.clone());
        }

        let handle = match &options.backend {
            BackendKind::InMemory { .. } => BackendHandle::InMemory(InMemoryStore::new()),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite { path } => BackendHandle::Sqlite(SqliteStore::open(path).await?),
            #[cfg(not(feature = "sqlite"))]
            BackendKind::Sqlite { .. } => {
                return Err(RepositoryError::InvalidOperation(
                    "SQLite backend requires the `sqlite` feature".to_string(),
                ))
            }
        };
        tracing::debug!(repository = %name, backend = %key, "Backend opened");
        backends.insert(key, handle.clone());
        Ok(handle)
    }

    pub(crate) fn pipeline<T: AggregateRoot>(
        &self,
        name: &RepositoryName,
        options: &RepositoryOptions,
        context: &ContextHandle,
    ) -> Arc<dyn Repository<T>> {
        let mut builder = PipelineBuilder::new(name.clone(), context.storage::<T>())
            .domain_events(self.dispatcher.clone(), options.domain_events)
            .validation(self.validators_for::<T>(name), options.validation)
            .interception(self.interceptors_for::<T>(name), options.interception);

        if options.caching.enabled {
            let cache = RepositoryCache::new(
                options.caching.strategy_for(T::TYPE_NAME),
                options.caching.default_expiration,
                CacheKeyProvider::new(name.clone(), T::TYPE_NAME),
                self.generations.clone(),
            );
            builder = builder.caching(cache, context.as_context());
        }
        builder.build()
    }

    /// Invalidates every cached entry of every repository.
    pub async fn invalidate_all(&self) {
        if self.generations.invalidate_all().await.is_none() {
            tracing::warn!("Global cache generation unavailable, cached entries not invalidated");
        }
    }
}
