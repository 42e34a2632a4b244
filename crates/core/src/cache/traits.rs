use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Byte-oriented key/value store backing the repository cache.
///
/// Keys reaching an implementation are already hashed by the caching
/// provider; implementations store them verbatim.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomically adds `delta` to an integer counter and returns the new
    /// value. A missing counter starts at zero, so `increment(key, 0)` reads
    /// a counter without ever resetting it.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;
}
