//! Domain event dispatch.
//!
//! Handlers are registered for one of two phases. Before-commit handlers see
//! the events an aggregate queued before its write reaches storage; committed
//! handlers see those events plus the synthetic `EntityAdded` /
//! `EntityUpdated` / `EntityRemoved` event once the write succeeded.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use repokit_core::entity::DomainEvent;
use repokit_core::storage::{RepositoryError, Result};

/// When a handler runs relative to the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    BeforeCommit,
    Committed,
}

/// Reacts to domain events.
///
/// Implemented for any `Fn(Arc<dyn DomainEvent>) -> impl Future<Output =
/// anyhow::Result<()>>`, so closures can be registered directly.
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    async fn handle(&self, event: Arc<dyn DomainEvent>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> DomainEventHandler for F
where
    F: Fn(Arc<dyn DomainEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Arc<dyn DomainEvent>) -> anyhow::Result<()> {
        self(event).await
    }
}

type Handlers = Arc<RwLock<Vec<Arc<dyn DomainEventHandler>>>>;

/// Shared registry of domain event handlers.
///
/// Cloning shares the handler lists.
#[derive(Clone, Default)]
pub struct DomainEventDispatcher {
    before_commit: Handlers,
    committed: Handlers,
}

impl std::fmt::Debug for DomainEventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainEventDispatcher")
            .field("before_commit", &self.snapshot(EventPhase::BeforeCommit).len())
            .field("committed", &self.snapshot(EventPhase::Committed).len())
            .finish()
    }
}

impl DomainEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self, phase: EventPhase) -> &Handlers {
        match phase {
            EventPhase::BeforeCommit => &self.before_commit,
            EventPhase::Committed => &self.committed,
        }
    }

    fn snapshot(&self, phase: EventPhase) -> Vec<Arc<dyn DomainEventHandler>> {
        self.handlers(phase)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers a handler for `phase`. Handlers run in registration order.
    pub fn subscribe(&self, phase: EventPhase, handler: impl DomainEventHandler + 'static) {
        self.handlers(phase)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    pub fn has_handlers(&self, phase: EventPhase) -> bool {
        !self.snapshot(phase).is_empty()
    }

    /// Delivers every event to every handler of `phase`, in order.
    ///
    /// Stops at the first handler error, which surfaces as
    /// `RepositoryError::EventHandler`.
    pub async fn dispatch(&self, phase: EventPhase, events: &[Arc<dyn DomainEvent>]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let handlers = self.snapshot(phase);
        if handlers.is_empty() {
            return Ok(());
        }

        for event in events {
            tracing::trace!(event = event.name(), ?phase, "Dispatching domain event");
            for handler in &handlers {
                if let Err(e) = handler.handle(event.clone()).await {
                    tracing::debug!(event = event.name(), ?phase, error = %e, "Event handler failed");
                    return Err(RepositoryError::EventHandler(format!("{}: {e:#}", event.name())));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::fixtures::{person, Person, PersonRenamed};
    use repokit_core::entity::EntityAdded;

    fn counting(counter: &Arc<AtomicUsize>) -> impl DomainEventHandler + 'static {
        let counter = counter.clone();
        move |_event: Arc<dyn DomainEvent>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_only_subscribed_phase() {
        let dispatcher = DomainEventDispatcher::new();
        let before = Arc::new(AtomicUsize::new(0));
        let committed = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(EventPhase::BeforeCommit, counting(&before));
        dispatcher.subscribe(EventPhase::Committed, counting(&committed));
        let events: Vec<Arc<dyn DomainEvent>> = vec![
            Arc::new(PersonRenamed::new("Tester")),
            Arc::new(EntityAdded::new(person("Tester", 1))),
        ];

        dispatcher
            .dispatch(EventPhase::Committed, &events)
            .await
            .unwrap();

        assert_eq!(before.load(Ordering::SeqCst), 0);
        assert_eq!(committed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handlers_can_filter_by_type() {
        let dispatcher = DomainEventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.subscribe(EventPhase::Committed, move |event: Arc<dyn DomainEvent>| {
            let sink = sink.clone();
            async move {
                if let Some(added) = event.downcast_ref::<EntityAdded<Person>>() {
                    sink.lock().unwrap().push(added.entity.name.clone());
                }
                Ok::<_, anyhow::Error>(())
            }
        });
        let events: Vec<Arc<dyn DomainEvent>> = vec![
            Arc::new(PersonRenamed::new("Ignored")),
            Arc::new(EntityAdded::new(person("Tester", 1))),
        ];

        dispatcher
            .dispatch(EventPhase::Committed, &events)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Tester".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_error_surfaces() {
        let dispatcher = DomainEventDispatcher::new();
        dispatcher.subscribe(EventPhase::BeforeCommit, |_event: Arc<dyn DomainEvent>| async {
            Err::<(), _>(anyhow::anyhow!("rejected"))
        });
        let events: Vec<Arc<dyn DomainEvent>> = vec![Arc::new(PersonRenamed::new("Tester"))];

        let result = dispatcher.dispatch(EventPhase::BeforeCommit, &events).await;

        assert!(matches!(result, Err(RepositoryError::EventHandler(message)) if message.contains("rejected")));
    }

    #[tokio::test]
    async fn test_no_handlers_is_noop() {
        let dispatcher = DomainEventDispatcher::new();
        let events: Vec<Arc<dyn DomainEvent>> = vec![Arc::new(PersonRenamed::new("Tester"))];

        assert!(!dispatcher.has_handlers(EventPhase::Committed));
        assert!(dispatcher
            .dispatch(EventPhase::Committed, &events)
            .await
            .is_ok());
    }
}
