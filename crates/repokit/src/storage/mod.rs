//! Storage backends and the generic document repository.
//!
//! # Feature Flags
//!
//! - The in-memory store is always available.
//! - `sqlite`: SQLite store via `rusqlite` and `tokio-rusqlite`.

mod document;
pub mod inmemory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use document::{DocumentCommand, DocumentRepository, DocumentStore, KeySequences};
pub use inmemory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
