//! SQLite document store.
//!
//! Documents are stored as JSON text in a single table keyed by collection
//! and id. Uses `rusqlite` for synchronous operations and `tokio-rusqlite`
//! for async wrapping.

mod error;
mod schema;
mod store;

pub use store::SqliteStore;
