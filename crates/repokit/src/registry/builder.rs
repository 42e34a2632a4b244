//! Assembles the decorator chain over a storage repository.

use std::sync::Arc;

use repokit_core::entity::AggregateRoot;
use repokit_core::interception::RepositoryInterceptor;
use repokit_core::options::RepositoryName;
use repokit_core::storage::Repository;
use repokit_core::validation::ValidationStrategy;

use crate::cache::RepositoryCache;
use crate::context::UnitOfWorkContext;
use crate::decorators::{
    CachingRepository, DomainEventsRepository, GuardRepository, InterceptionRepository,
    LoggingRepository, ValidationRepository,
};
use crate::events::DomainEventDispatcher;

/// Collects the parts of a pipeline. The layering order is fixed in
/// [`build`](Self::build) and does not depend on the order the parts were
/// supplied in.
pub struct PipelineBuilder<T: AggregateRoot> {
    name: RepositoryName,
    storage: Arc<dyn Repository<T>>,
    cache: Option<(RepositoryCache, Arc<dyn UnitOfWorkContext>)>,
    dispatcher: DomainEventDispatcher,
    domain_events: bool,
    validators: ValidationStrategy<T>,
    validation: bool,
    interceptors: Vec<Arc<dyn RepositoryInterceptor<T>>>,
    interception: bool,
}

impl<T: AggregateRoot> PipelineBuilder<T> {
    pub fn new(name: RepositoryName, storage: Arc<dyn Repository<T>>) -> Self {
        Self {
            name,
            storage,
            cache: None,
            dispatcher: DomainEventDispatcher::new(),
            domain_events: false,
            validators: ValidationStrategy::new(),
            validation: false,
            interceptors: Vec::new(),
            interception: false,
        }
    }

    pub fn caching(mut self, cache: RepositoryCache, context: Arc<dyn UnitOfWorkContext>) -> Self {
        self.cache = Some((cache, context));
        self
    }

    pub fn domain_events(mut self, dispatcher: DomainEventDispatcher, enabled: bool) -> Self {
        self.dispatcher = dispatcher;
        self.domain_events = enabled;
        self
    }

    pub fn validation(mut self, validators: ValidationStrategy<T>, enabled: bool) -> Self {
        self.validators = validators;
        self.validation = enabled;
        self
    }

    pub fn interception(
        mut self,
        interceptors: Vec<Arc<dyn RepositoryInterceptor<T>>>,
        enabled: bool,
    ) -> Self {
        self.interceptors = interceptors;
        self.interception = enabled;
        self
    }

    /// Wraps the storage repository, innermost layer first.
    pub fn build(self) -> Arc<dyn Repository<T>> {
        let storage = self.storage;
        let mut chain = storage.clone();

        if let Some((cache, context)) = self.cache {
            chain = Arc::new(CachingRepository::new(chain, cache, context));
        }
        chain = Arc::new(
            DomainEventsRepository::new(chain, self.dispatcher, self.domain_events)
                .resolving_from(storage),
        );
        chain = Arc::new(ValidationRepository::new(
            chain,
            self.validators,
            self.validation,
        ));
        chain = Arc::new(InterceptionRepository::new(
            chain,
            self.interceptors,
            self.interception,
        ));
        chain = Arc::new(GuardRepository::new(chain));

        tracing::debug!(
            repository = %self.name,
            entity_type = T::TYPE_NAME,
            "Repository pipeline built"
        );
        Arc::new(LoggingRepository::new(chain, self.name))
    }
}
