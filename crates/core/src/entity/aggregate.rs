use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DomainEvents, EntityKey};

/// An entity that is the unit of persistence and identity for repositories.
///
/// Implementors keep their pending domain events in a `DomainEvents` field
/// marked `#[serde(skip)]`.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Person {
///     id: Uuid,
///     name: String,
///     #[serde(skip)]
///     events: DomainEvents,
/// }
///
/// impl AggregateRoot for Person {
///     type Key = Uuid;
///     const TYPE_NAME: &'static str = "Person";
///
///     fn id(&self) -> &Uuid { &self.id }
///     fn set_id(&mut self, id: Uuid) { self.id = id; }
///     fn events(&self) -> &DomainEvents { &self.events }
///     fn events_mut(&mut self) -> &mut DomainEvents { &mut self.events }
/// }
/// ```
pub trait AggregateRoot:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    type Key: EntityKey;

    /// Stable name of the aggregate type. Used as the storage collection
    /// name and as a cache key segment.
    const TYPE_NAME: &'static str;

    fn id(&self) -> &Self::Key;

    fn set_id(&mut self, id: Self::Key);

    fn events(&self) -> &DomainEvents;

    fn events_mut(&mut self) -> &mut DomainEvents;

    /// Returns true until the entity has been assigned an identity.
    fn is_transient(&self) -> bool {
        *self.id() == Self::Key::default()
    }

    /// Puts the entity back into its transient state.
    fn reset_id(&mut self) {
        self.set_id(Self::Key::default());
    }
}
