use std::{env, time::Duration};

use repokit_core::cache::{CacheError, CachingStrategy};
use repokit_core::options::{BackendKind, CachingOptions, RepositoryOptions};

use crate::cache::CachingProvider;

/// Configuration of the default repository, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend, `inmemory` or `sqlite` (default: "inmemory")
    pub backend: String,
    /// Path to SQLite database file (default: "repokit.db")
    pub sqlite_path: String,
    /// Caching strategy, `standard`, `timeout` or `none` (default: "standard")
    pub cache_strategy: String,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Redis connection URL. Without it the in-process LRU cache is used.
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: Option<String>,
    /// Buffer writes until the unit of work is saved (default: false)
    pub unit_of_work: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REPOKIT_BACKEND` - Storage backend (default: "inmemory")
    /// - `SQLITE_PATH` - SQLite database path (default: "repokit.db")
    /// - `CACHE_STRATEGY` - Caching strategy (default: "standard")
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `REDIS_URL` - Redis connection URL (default: unset)
    /// - `UNIT_OF_WORK` - `true` or `1` to buffer writes (default: false)
    pub fn from_env() -> Self {
        Self {
            backend: env::var("REPOKIT_BACKEND").unwrap_or_else(|_| "inmemory".to_string()),
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| "repokit.db".to_string()),
            cache_strategy: env::var("CACHE_STRATEGY").unwrap_or_else(|_| "standard".to_string()),
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            unit_of_work: env::var("UNIT_OF_WORK")
                .ok()
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Options for the default repository.
    pub fn to_options(&self) -> RepositoryOptions {
        let backend = match self.backend.trim().to_ascii_lowercase().as_str() {
            "sqlite" => BackendKind::Sqlite {
                path: self.sqlite_path.clone(),
            },
            "inmemory" | "in_memory" | "memory" => BackendKind::InMemory { database: None },
            other => {
                tracing::warn!(backend = other, "Unknown backend, using in-memory storage");
                BackendKind::InMemory { database: None }
            }
        };

        let strategy = CachingStrategy::from_name(&self.cache_strategy, Some(self.cache_ttl()))
            .unwrap_or_else(|| {
                tracing::warn!(
                    strategy = %self.cache_strategy,
                    "Unknown caching strategy, using standard"
                );
                CachingStrategy::Standard
            });

        RepositoryOptions {
            backend,
            unit_of_work: self.unit_of_work,
            caching: CachingOptions {
                enabled: strategy.is_enabled(),
                default_strategy: strategy,
                default_expiration: Some(self.cache_ttl()),
                ..CachingOptions::default()
            },
            ..RepositoryOptions::default()
        }
    }

    /// Connects the configured cache backend.
    ///
    /// Falls back to the in-process LRU cache when no Redis URL is set or the
    /// `redis` feature is disabled.
    pub async fn caching_provider(&self) -> Result<CachingProvider, CacheError> {
        #[cfg(feature = "redis")]
        if let Some(url) = &self.redis_url {
            let cache = crate::cache::RedisCache::new(url).await?;
            tracing::info!("Using Redis cache");
            return Ok(CachingProvider::new(std::sync::Arc::new(cache)));
        }

        #[cfg(not(feature = "redis"))]
        if self.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the `redis` feature is disabled");
        }

        tracing::info!(max_entries = self.cache_max_entries, "Using in-memory cache");
        Ok(CachingProvider::memory(self.cache_max_entries))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
