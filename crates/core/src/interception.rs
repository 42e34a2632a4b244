//! Hooks the interception decorator invokes around repository calls.

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::AggregateRoot;
use crate::query::Filter;

/// Per-call signal an interceptor sets to veto a write.
///
/// A fresh event is created for every intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptionEvent {
    pub cancel_operation: bool,
    pub cancellation_message: Option<String>,
    /// Surface the cancellation as `RepositoryError::InvalidOperation`
    /// instead of silently skipping the write.
    pub throw_on_cancellation: bool,
}

impl InterceptionEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the operation without raising an error.
    pub fn cancel(&mut self, message: impl Into<String>) {
        self.cancel_operation = true;
        self.cancellation_message = Some(message.into());
    }

    /// Skips the operation and fails the call.
    pub fn cancel_and_throw(&mut self, message: impl Into<String>) {
        self.cancel(message);
        self.throw_on_cancellation = true;
    }

    pub fn message(&self) -> &str {
        self.cancellation_message
            .as_deref()
            .unwrap_or("Operation cancelled by interceptor")
    }
}

/// Read operations reported to interceptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadOperation {
    Get,
    Exists,
    FindOne,
    FindMany,
    Count,
    Sum,
    Average,
}

/// Result of a read, as observed by `after_read`.
#[derive(Debug)]
pub enum ReadOutcome<'a, T> {
    Item(Option<&'a T>),
    Items(&'a [T]),
    Projection(Option<&'a Value>),
    Projections(&'a [Value]),
    Exists(bool),
    Count(usize),
    Scalar(Option<f64>),
}

impl<T> Clone for ReadOutcome<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadOutcome<'_, T> {}

/// Business hooks around one aggregate type.
///
/// Every hook has an empty default so implementors only override what they
/// need. `before_read` may rewrite the filter a query runs with.
#[async_trait]
pub trait RepositoryInterceptor<T: AggregateRoot>: Send + Sync {
    async fn before_add(&self, _item: &T, _event: &mut InterceptionEvent) {}

    async fn before_update(&self, _item: &T, _event: &mut InterceptionEvent) {}

    async fn before_remove(&self, _item: &T, _event: &mut InterceptionEvent) {}

    async fn before_remove_by_id(&self, _id: &T::Key, _event: &mut InterceptionEvent) {}

    async fn before_remove_where(&self, _filter: &mut Filter, _event: &mut InterceptionEvent) {}

    async fn before_read(&self, _operation: ReadOperation, _filter: &mut Filter) {}

    async fn after_read(&self, _operation: ReadOperation, _outcome: ReadOutcome<'_, T>) {}
}
