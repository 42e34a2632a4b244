//! In-memory document store.
//!
//! Data lives as long as the last clone of the store. Named databases are
//! shared through the registry so several repositories see the same data.

mod store;

pub use store::InMemoryStore;
