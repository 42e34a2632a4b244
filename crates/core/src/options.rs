//! Per-repository configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cache::CachingStrategy;

/// Identifies one configured repository.
///
/// Used as the namespace for cache keys, context lookup and named service
/// resolution. Cheap to clone; equality is by the wrapped string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryName(Arc<str>);

impl RepositoryName {
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RepositoryName {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryName({:?})", &*self.0)
    }
}

impl From<&str> for RepositoryName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RepositoryName {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for RepositoryName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RepositoryName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.trim().is_empty() {
            return Err(serde::de::Error::custom("repository name cannot be empty"));
        }
        Ok(Self::from(name))
    }
}

/// Which storage backend a repository talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local document store. Repositories naming the same
    /// `database` share data; without a name each repository gets its own.
    InMemory {
        #[serde(default)]
        database: Option<String>,
    },
    /// SQLite database file. `":memory:"` opens a private in-memory database.
    Sqlite { path: String },
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::InMemory { database: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingOptions {
    pub enabled: bool,
    pub default_strategy: CachingStrategy,
    /// Expiration for generation-scoped entries under the standard strategy.
    #[serde(with = "crate::serde::option_duration_secs")]
    pub default_expiration: Option<Duration>,
    /// Per aggregate type strategy, keyed by `AggregateRoot::TYPE_NAME`.
    pub overrides: HashMap<String, CachingStrategy>,
}

impl Default for CachingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            default_strategy: CachingStrategy::Standard,
            default_expiration: None,
            overrides: HashMap::new(),
        }
    }
}

impl CachingOptions {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Resolves the strategy for an aggregate type.
    pub fn strategy_for(&self, type_name: &str) -> CachingStrategy {
        if !self.enabled {
            return CachingStrategy::NoCaching;
        }
        self.overrides
            .get(type_name)
            .copied()
            .unwrap_or(self.default_strategy)
    }
}

/// Configuration of one named repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryOptions {
    pub backend: BackendKind,
    /// Buffer writes until `UnitOfWork::save_changes` instead of applying
    /// them immediately.
    pub unit_of_work: bool,
    pub caching: CachingOptions,
    pub validation: bool,
    pub interception: bool,
    pub domain_events: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            unit_of_work: false,
            caching: CachingOptions::default(),
            validation: true,
            interception: true,
            domain_events: true,
        }
    }
}

impl RepositoryOptions {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    pub fn with_unit_of_work(mut self, enabled: bool) -> Self {
        self.unit_of_work = enabled;
        self
    }

    pub fn with_caching(mut self, caching: CachingOptions) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_strategy(mut self, strategy: CachingStrategy) -> Self {
        self.caching.enabled = true;
        self.caching.default_strategy = strategy;
        self
    }
}
