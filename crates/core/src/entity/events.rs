use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::AggregateRoot;

/// A fact about an aggregate that handlers can react to.
///
/// Handlers receive `&dyn DomainEvent` and use [`downcast_ref`] to pick the
/// events they care about.
///
/// [`downcast_ref`]: trait.DomainEvent.html#method.downcast_ref
pub trait DomainEvent: Any + fmt::Debug + Send + Sync {
    /// Human readable event name, used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn DomainEvent {
    /// Returns the concrete event if it is of type `E`.
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        (self as &dyn Any).downcast_ref::<E>()
    }

    /// Returns true if the event is of type `E`.
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }
}

/// Ordered list of events raised by an aggregate and not yet dispatched.
///
/// Pending events never take part in equality or serialization of the
/// owning aggregate.
#[derive(Clone, Default)]
pub struct DomainEvents(Vec<Arc<dyn DomainEvent>>);

impl DomainEvents {
    /// Creates an empty event list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event.
    pub fn push<E: DomainEvent>(&mut self, event: E) {
        self.0.push(Arc::new(event));
    }

    /// Queues an already shared event.
    pub fn push_shared(&mut self, event: Arc<dyn DomainEvent>) {
        self.0.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DomainEvent>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes and returns every queued event.
    pub fn take(&mut self) -> Vec<Arc<dyn DomainEvent>> {
        std::mem::take(&mut self.0)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for DomainEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|event| event.name()))
            .finish()
    }
}

impl PartialEq for DomainEvents {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for DomainEvents {}

/// Raised after an aggregate has been persisted for the first time.
#[derive(Debug, Clone)]
pub struct EntityAdded<T> {
    pub entity: T,
    pub occurred_at: DateTime<Utc>,
}

/// Raised after an aggregate has been updated.
#[derive(Debug, Clone)]
pub struct EntityUpdated<T> {
    pub entity: T,
    pub occurred_at: DateTime<Utc>,
}

/// Raised after an aggregate has been removed.
///
/// `entity` still carries the identity it had before removal.
#[derive(Debug, Clone)]
pub struct EntityRemoved<T> {
    pub entity: T,
    pub occurred_at: DateTime<Utc>,
}

impl<T: AggregateRoot> EntityAdded<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            occurred_at: Utc::now(),
        }
    }
}

impl<T: AggregateRoot> EntityUpdated<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            occurred_at: Utc::now(),
        }
    }
}

impl<T: AggregateRoot> EntityRemoved<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            occurred_at: Utc::now(),
        }
    }
}

impl<T: AggregateRoot> DomainEvent for EntityAdded<T> {
    fn name(&self) -> &'static str {
        "EntityAdded"
    }
}

impl<T: AggregateRoot> DomainEvent for EntityUpdated<T> {
    fn name(&self) -> &'static str {
        "EntityUpdated"
    }
}

impl<T: AggregateRoot> DomainEvent for EntityRemoved<T> {
    fn name(&self) -> &'static str {
        "EntityRemoved"
    }
}
