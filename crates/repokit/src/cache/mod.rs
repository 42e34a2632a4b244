//! Cache backends and the caching machinery built on them.
//!
//! # Feature Flags
//!
//! - The in-memory LRU backend is always available.
//! - `redis`: Redis backend, for generation counters shared between processes.

mod generations;
pub mod memory;
mod provider;
#[cfg(feature = "redis")]
pub mod redis_impl;
mod repository;

pub use generations::CacheGenerations;
pub use memory::MemoryCache;
pub use provider::CachingProvider;
#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
pub use repository::RepositoryCache;
