mod error;
mod keys;
pub mod serialization;
mod strategy;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{CacheKeyProvider, CacheOperation, GLOBAL_GENERATION_KEY};
pub use strategy::{CachingStrategy, DEFAULT_TIMEOUT_EXPIRATION};
pub use traits::Cache;
