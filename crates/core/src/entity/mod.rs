//! Aggregate roots, their identity keys, and the domain events they carry.

mod aggregate;
mod events;
mod key;

pub use aggregate::AggregateRoot;
pub use events::{DomainEvent, DomainEvents, EntityAdded, EntityRemoved, EntityUpdated};
pub use key::{EntityKey, GeneratedKey, KeyGenerator, KeyKind};
