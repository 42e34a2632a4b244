use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Expiration used by `timeout` when none is configured.
pub const DEFAULT_TIMEOUT_EXPIRATION: Duration = Duration::from_secs(300);

/// How a repository consults and populates the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachingStrategy {
    /// Never touches the cache.
    NoCaching,
    /// Write-through identity entries plus generation-scoped query entries.
    #[default]
    Standard,
    /// Every entry expires after `expiration`. Writes do not bump the
    /// generation unless `generational` is set, so queries may be stale for
    /// up to `expiration`.
    Timeout {
        #[serde(with = "crate::serde::duration_secs")]
        expiration: Duration,
        #[serde(default)]
        generational: bool,
    },
}

impl CachingStrategy {
    /// Parses a strategy name as found in environment variables.
    ///
    /// Accepts `none`, `standard` and `timeout` (case-insensitive).
    pub fn from_name(name: &str, expiration: Option<Duration>) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "nocaching" | "no_caching" | "off" => Some(Self::NoCaching),
            "standard" => Some(Self::Standard),
            "timeout" => Some(Self::Timeout {
                expiration: expiration.unwrap_or(DEFAULT_TIMEOUT_EXPIRATION),
                generational: false,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoCaching => "none",
            Self::Standard => "standard",
            Self::Timeout { .. } => "timeout",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoCaching)
    }

    /// Whether query keys embed the real generation counter and writes
    /// increment it.
    pub fn is_generational(&self) -> bool {
        match self {
            Self::NoCaching => false,
            Self::Standard => true,
            Self::Timeout { generational, .. } => *generational,
        }
    }

    /// Expiration for identity-scoped entries.
    pub fn identity_ttl(&self) -> Option<Duration> {
        match self {
            Self::Timeout { expiration, .. } => Some(*expiration),
            _ => None,
        }
    }

    /// Expiration for generation-scoped entries.
    pub fn query_ttl(&self, default_expiration: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Timeout { expiration, .. } => Some(*expiration),
            _ => default_expiration,
        }
    }
}
