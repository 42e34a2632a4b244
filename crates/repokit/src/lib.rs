//! Storage agnostic repositories with a composable decorator pipeline.
//!
//! A repository is resolved by name from a [`RepositoryRegistry`]. Every
//! call runs through logging, guard, interception, validation, domain events
//! and caching layers before it reaches a storage backend. Writes go through
//! a command buffer that either applies them at once or holds them for a
//! [`UnitOfWork`].
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite storage backend.
//! - `redis`: Redis cache backend.

pub mod cache;
pub mod config;
pub mod context;
pub mod decorators;
pub mod events;
pub mod registry;
pub mod storage;

#[cfg(test)]
mod fixtures;

pub use config::Config;
pub use context::UnitOfWork;
pub use events::{DomainEventDispatcher, DomainEventHandler, EventPhase};
pub use registry::{PipelineBuilder, RepositoryRegistry};

pub use repokit_core::entity::{AggregateRoot, DomainEvent, DomainEvents};
pub use repokit_core::options::{RepositoryName, RepositoryOptions};
pub use repokit_core::query::{Filter, QueryOptions, Selector};
pub use repokit_core::storage::{Repository, RepositoryError};
