//! Deterministic cache key construction.
//!
//! Layout:
//!
//! ```text
//! Repositories/{global}/{repository}/{type}/{operation}/{id}                 identity scoped
//! Repositories/{global}/{repository}/{type}/{generation}/{operation}/{json}  generation scoped
//! Repositories/{repository}/{type}/Generation                               generation counter
//! Repositories/GlobalGeneration                                             global counter
//! ```
//!
//! Filters, selectors and options are rendered as JSON. Object members are
//! emitted in sorted order, so equal inputs always give equal keys.

use std::fmt;

use serde::Serialize;

use crate::options::RepositoryName;

use super::{CacheError, Result};

/// Counter bumped to invalidate every repository at once.
pub const GLOBAL_GENERATION_KEY: &str = "Repositories/GlobalGeneration";

/// Operation discriminator embedded in every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    GetProjection,
    Exists,
    ExistsWhere,
    FindOne,
    FindOneProjection,
    FindMany,
    FindManyProjection,
    Count,
    Sum,
    Average,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::GetProjection => "GetProjection",
            Self::Exists => "Exists",
            Self::ExistsWhere => "ExistsWhere",
            Self::FindOne => "FindOne",
            Self::FindOneProjection => "FindOneProjection",
            Self::FindMany => "FindMany",
            Self::FindManyProjection => "FindManyProjection",
            Self::Count => "Count",
            Self::Sum => "Sum",
            Self::Average => "Average",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the keys for one (repository, aggregate type) pair.
#[derive(Debug, Clone)]
pub struct CacheKeyProvider {
    repository: RepositoryName,
    type_name: &'static str,
}

impl CacheKeyProvider {
    pub fn new(repository: RepositoryName, type_name: &'static str) -> Self {
        Self {
            repository,
            type_name,
        }
    }

    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Key of the per (repository, type) generation counter.
    pub fn generation_key(&self) -> String {
        format!("Repositories/{}/{}/Generation", self.repository, self.type_name)
    }

    pub fn prefix(&self, global_generation: i64) -> String {
        format!(
            "Repositories/{}/{}/{}",
            global_generation, self.repository, self.type_name
        )
    }

    /// Key for an entry addressed by entity identity.
    pub fn identity_key<K: Serialize + ?Sized>(
        &self,
        global_generation: i64,
        operation: CacheOperation,
        id: &K,
    ) -> Result<String> {
        Ok(format!(
            "{}/{}/{}",
            self.prefix(global_generation),
            operation,
            to_json(id)?
        ))
    }

    /// Key for an entry that must be dropped whenever the type's generation
    /// moves on.
    pub fn generation_scoped_key<Q: Serialize + ?Sized>(
        &self,
        global_generation: i64,
        generation: i64,
        operation: CacheOperation,
        query: &Q,
    ) -> Result<String> {
        Ok(format!(
            "{}/{}/{}/{}",
            self.prefix(global_generation),
            generation,
            operation,
            to_json(query)?
        ))
    }
}

fn to_json<V: Serialize + ?Sized>(value: &V) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))
}
