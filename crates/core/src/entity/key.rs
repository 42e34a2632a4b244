use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{RepositoryError, Result};

/// The closed set of identity kinds an aggregate key can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Uuid,
    Text,
    Integer,
}

/// A freshly generated identity, before conversion into the entity's key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKey {
    Uuid(Uuid),
    Text(String),
    Integer(i64),
}

/// Identity type of an aggregate root.
///
/// The default value of a key means "not assigned yet": an entity whose key
/// equals `Self::default()` is transient.
pub trait EntityKey:
    Clone
    + Debug
    + Display
    + Default
    + Eq
    + Ord
    + Hash
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The kind of generator used for this key type.
    const KIND: KeyKind;

    /// Converts a generated identity into this key type.
    fn from_generated(key: GeneratedKey) -> Result<Self>;

    /// Returns true when the key cannot identify a persisted entity.
    fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

fn unsupported(kind: &str, key: &GeneratedKey) -> RepositoryError {
    RepositoryError::InvalidData(format!("Cannot build a {kind} key from {key:?}"))
}

impl EntityKey for Uuid {
    const KIND: KeyKind = KeyKind::Uuid;

    fn from_generated(key: GeneratedKey) -> Result<Self> {
        match key {
            GeneratedKey::Uuid(id) => Ok(id),
            GeneratedKey::Text(ref text) => {
                Uuid::parse_str(text).map_err(|_| unsupported("uuid", &key))
            }
            GeneratedKey::Integer(_) => Err(unsupported("uuid", &key)),
        }
    }
}

impl EntityKey for String {
    const KIND: KeyKind = KeyKind::Text;

    fn from_generated(key: GeneratedKey) -> Result<Self> {
        Ok(match key {
            GeneratedKey::Uuid(id) => id.to_string(),
            GeneratedKey::Text(text) => text,
            GeneratedKey::Integer(value) => value.to_string(),
        })
    }

    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl EntityKey for i64 {
    const KIND: KeyKind = KeyKind::Integer;

    fn from_generated(key: GeneratedKey) -> Result<Self> {
        match key {
            GeneratedKey::Integer(value) => Ok(value),
            other => Err(unsupported("integer", &other)),
        }
    }
}

impl EntityKey for i32 {
    const KIND: KeyKind = KeyKind::Integer;

    fn from_generated(key: GeneratedKey) -> Result<Self> {
        match key {
            GeneratedKey::Integer(value) => {
                i32::try_from(value).map_err(|_| unsupported("i32", &GeneratedKey::Integer(value)))
            }
            other => Err(unsupported("i32", &other)),
        }
    }
}

/// Produces new identities for transient entities.
///
/// Selected once per storage repository from the key type's [`KeyKind`].
#[derive(Debug, Clone)]
pub enum KeyGenerator {
    /// Random v4 UUIDs.
    Uuid,
    /// Random v4 UUIDs rendered as hyphenated text.
    Text,
    /// Monotonic integers starting after the last value seen.
    Sequence(Arc<AtomicI64>),
}

impl KeyGenerator {
    /// Returns the generator for a key kind.
    pub fn for_kind(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Uuid => Self::Uuid,
            KeyKind::Text => Self::Text,
            KeyKind::Integer => Self::Sequence(Arc::new(AtomicI64::new(0))),
        }
    }

    /// Returns the generator for the key type `K`.
    pub fn for_key<K: EntityKey>() -> Self {
        Self::for_kind(K::KIND)
    }

    /// Returns true if this generator needs seeding from existing data.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    /// Makes sure the next generated integer is greater than `last`.
    ///
    /// No-op for non-sequence generators.
    pub fn observe(&self, last: i64) {
        if let Self::Sequence(counter) = self {
            counter.fetch_max(last, Ordering::SeqCst);
        }
    }

    /// Generates the next identity.
    pub fn next_key(&self) -> GeneratedKey {
        match self {
            Self::Uuid => GeneratedKey::Uuid(Uuid::new_v4()),
            Self::Text => GeneratedKey::Text(Uuid::new_v4().to_string()),
            Self::Sequence(counter) => {
                GeneratedKey::Integer(counter.fetch_add(1, Ordering::SeqCst) + 1)
            }
        }
    }

    /// Generates the next identity converted to `K`.
    pub fn generate<K: EntityKey>(&self) -> Result<K> {
        K::from_generated(self.next_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_generator_produces_non_blank_keys() {
        let generator = KeyGenerator::for_key::<Uuid>();
        let key: Uuid = generator.generate().unwrap();

        assert!(!key.is_blank());
        assert_ne!(key, generator.generate::<Uuid>().unwrap());
    }

    #[test]
    fn test_text_generator_produces_uuid_strings() {
        let generator = KeyGenerator::for_key::<String>();
        let key: String = generator.generate().unwrap();

        assert!(Uuid::parse_str(&key).is_ok());
    }

    #[test]
    fn test_sequence_generator_is_monotonic() {
        let generator = KeyGenerator::for_key::<i64>();

        assert_eq!(generator.generate::<i64>().unwrap(), 1);
        assert_eq!(generator.generate::<i64>().unwrap(), 2);
    }

    #[test]
    fn test_sequence_generator_observes_existing_values() {
        let generator = KeyGenerator::for_key::<i32>();
        generator.observe(41);
        generator.observe(7);

        assert_eq!(generator.generate::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_blank_keys() {
        assert!(Uuid::nil().is_blank());
        assert!(String::new().is_blank());
        assert!("   ".to_string().is_blank());
        assert!(0_i64.is_blank());
        assert!(!7_i64.is_blank());
    }

    #[test]
    fn test_integer_key_rejects_uuid() {
        let result = i64::from_generated(GeneratedKey::Uuid(Uuid::nil()));

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }
}
