use async_trait::async_trait;
use serde_json::Value;

use crate::entity::AggregateRoot;
use crate::query::{Filter, QueryOptions, Selector};

use super::Result;

/// The uniform CRUD and query contract for aggregate roots.
///
/// Implemented by storage backends and by every decorator wrapping them, so
/// the whole pipeline can be driven through `Arc<dyn Repository<T>>`.
#[async_trait]
pub trait Repository<T: AggregateRoot>: Send + Sync {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Persists a transient item and returns it with its assigned key.
    async fn add(&self, item: T) -> Result<T>;

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>>;

    /// Replaces a persisted item.
    async fn update(&self, item: T) -> Result<T>;

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>>;

    /// Removes an item. The returned item is transient again.
    async fn remove(&self, item: T) -> Result<T>;

    async fn remove_by_id(&self, id: &T::Key) -> Result<()>;

    /// Removes every item matching the filter and returns how many were removed.
    async fn remove_where(&self, filter: &Filter) -> Result<usize>;

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>>;

    // ========================================================================
    // Reads
    // ========================================================================

    async fn get(&self, id: &T::Key) -> Result<Option<T>>;

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>>;

    async fn exists(&self, id: &T::Key) -> Result<bool>;

    async fn exists_where(&self, filter: &Filter) -> Result<bool>;

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>>;

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>>;

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>>;

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>>;

    async fn count(&self) -> Result<usize>;

    async fn count_where(&self, filter: &Filter) -> Result<usize>;

    /// Sums a numeric field over the matching items. Nulls are skipped.
    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64>;

    /// Averages a numeric field over the matching items, `None` if there are none.
    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>>;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn is_disposed(&self) -> bool;

    fn dispose(&self);

    async fn dispose_async(&self) -> Result<()> {
        self.dispose();
        Ok(())
    }
}
