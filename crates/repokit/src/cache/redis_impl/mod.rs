//! Redis cache backend implementation.
//!
//! Provides a distributed cache for multi-instance deployments, so every
//! process sees the same generation counters.

mod cache;
mod error;

pub use cache::RedisCache;
