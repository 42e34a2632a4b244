//! Interception decorator.
//!
//! Runs the interceptors registered for an aggregate type around every call.
//! Writes may be vetoed through the [`InterceptionEvent`]; reads may have
//! their filter rewritten and have their results observed.
//!
//! The guard layer checks filters before interceptors run, so a rewritten
//! filter is checked again here before it goes further in.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::AggregateRoot;
use repokit_core::interception::{
    InterceptionEvent, ReadOperation, ReadOutcome, RepositoryInterceptor,
};
use repokit_core::query::{Filter, QueryOptions, Selector};
use repokit_core::storage::{Repository, RepositoryError, Result};

enum WriteTarget<'a, T: AggregateRoot> {
    Add(&'a T),
    Update(&'a T),
    Remove(&'a T),
    RemoveById(&'a T::Key),
}

impl<T: AggregateRoot> Clone for WriteTarget<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: AggregateRoot> Copy for WriteTarget<'_, T> {}

impl<T: AggregateRoot> WriteTarget<'_, T> {
    fn operation(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Update(_) => "update",
            Self::Remove(_) => "remove",
            Self::RemoveById(_) => "remove_by_id",
        }
    }
}

pub struct InterceptionRepository<T: AggregateRoot> {
    inner: Arc<dyn Repository<T>>,
    interceptors: Vec<Arc<dyn RepositoryInterceptor<T>>>,
    enabled: bool,
}

impl<T: AggregateRoot> InterceptionRepository<T> {
    pub fn new(
        inner: Arc<dyn Repository<T>>,
        interceptors: Vec<Arc<dyn RepositoryInterceptor<T>>>,
        enabled: bool,
    ) -> Self {
        Self {
            inner,
            interceptors,
            enabled,
        }
    }

    fn active(&self) -> bool {
        self.enabled && !self.interceptors.is_empty()
    }

    /// Runs the `before_*` hooks until one of them cancels.
    async fn before_write(&self, target: WriteTarget<'_, T>) -> InterceptionEvent {
        let mut event = InterceptionEvent::new();
        for interceptor in &self.interceptors {
            match target {
                WriteTarget::Add(item) => interceptor.before_add(item, &mut event).await,
                WriteTarget::Update(item) => interceptor.before_update(item, &mut event).await,
                WriteTarget::Remove(item) => interceptor.before_remove(item, &mut event).await,
                WriteTarget::RemoveById(id) => {
                    interceptor.before_remove_by_id(id, &mut event).await
                }
            }
            if event.cancel_operation {
                break;
            }
        }
        event
    }

    /// Returns whether the write should proceed.
    fn proceed(&self, operation: &'static str, event: &InterceptionEvent) -> Result<bool> {
        if !event.cancel_operation {
            return Ok(true);
        }
        if event.throw_on_cancellation {
            return Err(RepositoryError::InvalidOperation(event.message().to_string()));
        }
        tracing::warn!(
            entity_type = T::TYPE_NAME,
            operation,
            reason = event.message(),
            "Operation cancelled by interceptor"
        );
        Ok(false)
    }

    async fn allowed(&self, target: WriteTarget<'_, T>) -> Result<bool> {
        let event = self.before_write(target).await;
        self.proceed(target.operation(), &event)
    }

    /// Keeps the items no interceptor cancelled. Fails if a cancellation
    /// asks to throw.
    async fn admit<F>(&self, items: Vec<T>, target: F) -> Result<Vec<T>>
    where
        F: for<'a> Fn(&'a T) -> WriteTarget<'a, T> + Send + Sync,
    {
        let mut admitted = Vec::with_capacity(items.len());
        for item in items {
            if self.allowed(target(&item)).await? {
                admitted.push(item);
            }
        }
        Ok(admitted)
    }

    async fn rewrite(&self, operation: ReadOperation, filter: &Filter) -> Result<Filter> {
        let mut filter = filter.clone();
        for interceptor in &self.interceptors {
            interceptor.before_read(operation, &mut filter).await;
        }
        checked(filter)
    }

    async fn observe(&self, operation: ReadOperation, outcome: ReadOutcome<'_, T>) {
        for interceptor in &self.interceptors {
            interceptor.after_read(operation, outcome).await;
        }
    }
}

fn checked(filter: Filter) -> Result<Filter> {
    filter
        .validate()
        .map_err(|message| RepositoryError::invalid_argument("filter", message))?;
    Ok(filter)
}

#[async_trait]
impl<T: AggregateRoot> Repository<T> for InterceptionRepository<T> {
    async fn add(&self, item: T) -> Result<T> {
        if !self.active() || self.allowed(WriteTarget::Add(&item)).await? {
            return self.inner.add(item).await;
        }
        Ok(item)
    }

    async fn add_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        if !self.active() {
            return self.inner.add_range(items).await;
        }
        let admitted = self.admit(items, |item| WriteTarget::Add(item)).await?;
        if admitted.is_empty() {
            return Ok(admitted);
        }
        self.inner.add_range(admitted).await
    }

    async fn update(&self, item: T) -> Result<T> {
        if !self.active() || self.allowed(WriteTarget::Update(&item)).await? {
            return self.inner.update(item).await;
        }
        Ok(item)
    }

    async fn update_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        if !self.active() {
            return self.inner.update_range(items).await;
        }
        let admitted = self.admit(items, |item| WriteTarget::Update(item)).await?;
        if admitted.is_empty() {
            return Ok(admitted);
        }
        self.inner.update_range(admitted).await
    }

    async fn remove(&self, item: T) -> Result<T> {
        if !self.active() || self.allowed(WriteTarget::Remove(&item)).await? {
            return self.inner.remove(item).await;
        }
        Ok(item)
    }

    async fn remove_by_id(&self, id: &T::Key) -> Result<()> {
        if !self.active() || self.allowed(WriteTarget::RemoveById(id)).await? {
            return self.inner.remove_by_id(id).await;
        }
        Ok(())
    }

    async fn remove_where(&self, filter: &Filter) -> Result<usize> {
        if !self.active() {
            return self.inner.remove_where(filter).await;
        }

        let mut filter = filter.clone();
        let mut event = InterceptionEvent::new();
        for interceptor in &self.interceptors {
            interceptor.before_remove_where(&mut filter, &mut event).await;
            if event.cancel_operation {
                break;
            }
        }

        if self.proceed("remove_where", &event)? {
            self.inner.remove_where(&checked(filter)?).await
        } else {
            Ok(0)
        }
    }

    async fn remove_range(&self, items: Vec<T>) -> Result<Vec<T>> {
        if !self.active() {
            return self.inner.remove_range(items).await;
        }
        let admitted = self.admit(items, |item| WriteTarget::Remove(item)).await?;
        if admitted.is_empty() {
            return Ok(admitted);
        }
        self.inner.remove_range(admitted).await
    }

    async fn get(&self, id: &T::Key) -> Result<Option<T>> {
        let item = self.inner.get(id).await?;
        if self.active() {
            self.observe(ReadOperation::Get, ReadOutcome::Item(item.as_ref()))
                .await;
        }
        Ok(item)
    }

    async fn get_projection(&self, id: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        let projection = self.inner.get_projection(id, selector).await?;
        if self.active() {
            self.observe(
                ReadOperation::Get,
                ReadOutcome::Projection(projection.as_ref()),
            )
            .await;
        }
        Ok(projection)
    }

    async fn exists(&self, id: &T::Key) -> Result<bool> {
        let exists = self.inner.exists(id).await?;
        if self.active() {
            self.observe(ReadOperation::Exists, ReadOutcome::Exists(exists))
                .await;
        }
        Ok(exists)
    }

    async fn exists_where(&self, filter: &Filter) -> Result<bool> {
        if !self.active() {
            return self.inner.exists_where(filter).await;
        }
        let filter = self.rewrite(ReadOperation::Exists, filter).await?;
        let exists = self.inner.exists_where(&filter).await?;
        self.observe(ReadOperation::Exists, ReadOutcome::Exists(exists))
            .await;
        Ok(exists)
    }

    async fn find_one(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Option<T>> {
        if !self.active() {
            return self.inner.find_one(filter, options).await;
        }
        let filter = self.rewrite(ReadOperation::FindOne, filter).await?;
        let item = self.inner.find_one(&filter, options).await?;
        self.observe(ReadOperation::FindOne, ReadOutcome::Item(item.as_ref()))
            .await;
        Ok(item)
    }

    async fn find_one_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Option<Value>> {
        if !self.active() {
            return self
                .inner
                .find_one_projection(filter, selector, options)
                .await;
        }
        let filter = self.rewrite(ReadOperation::FindOne, filter).await?;
        let projection = self
            .inner
            .find_one_projection(&filter, selector, options)
            .await?;
        self.observe(
            ReadOperation::FindOne,
            ReadOutcome::Projection(projection.as_ref()),
        )
        .await;
        Ok(projection)
    }

    async fn find_many(&self, filter: &Filter, options: Option<&QueryOptions>) -> Result<Vec<T>> {
        if !self.active() {
            return self.inner.find_many(filter, options).await;
        }
        let filter = self.rewrite(ReadOperation::FindMany, filter).await?;
        let items = self.inner.find_many(&filter, options).await?;
        self.observe(ReadOperation::FindMany, ReadOutcome::Items(&items))
            .await;
        Ok(items)
    }

    async fn find_many_projection(
        &self,
        filter: &Filter,
        selector: &Selector,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<Value>> {
        if !self.active() {
            return self
                .inner
                .find_many_projection(filter, selector, options)
                .await;
        }
        let filter = self.rewrite(ReadOperation::FindMany, filter).await?;
        let projections = self
            .inner
            .find_many_projection(&filter, selector, options)
            .await?;
        self.observe(
            ReadOperation::FindMany,
            ReadOutcome::Projections(&projections),
        )
        .await;
        Ok(projections)
    }

    async fn count(&self) -> Result<usize> {
        if !self.active() {
            return self.inner.count().await;
        }
        let filter = self.rewrite(ReadOperation::Count, &Filter::All).await?;
        let count = if filter.is_all() {
            self.inner.count().await?
        } else {
            self.inner.count_where(&filter).await?
        };
        self.observe(ReadOperation::Count, ReadOutcome::Count(count))
            .await;
        Ok(count)
    }

    async fn count_where(&self, filter: &Filter) -> Result<usize> {
        if !self.active() {
            return self.inner.count_where(filter).await;
        }
        let filter = self.rewrite(ReadOperation::Count, filter).await?;
        let count = self.inner.count_where(&filter).await?;
        self.observe(ReadOperation::Count, ReadOutcome::Count(count))
            .await;
        Ok(count)
    }

    async fn sum(&self, field: &str, filter: &Filter) -> Result<f64> {
        if !self.active() {
            return self.inner.sum(field, filter).await;
        }
        let filter = self.rewrite(ReadOperation::Sum, filter).await?;
        let sum = self.inner.sum(field, &filter).await?;
        self.observe(ReadOperation::Sum, ReadOutcome::Scalar(Some(sum)))
            .await;
        Ok(sum)
    }

    async fn average(&self, field: &str, filter: &Filter) -> Result<Option<f64>> {
        if !self.active() {
            return self.inner.average(field, filter).await;
        }
        let filter = self.rewrite(ReadOperation::Average, filter).await?;
        let average = self.inner.average(field, &filter).await?;
        self.observe(ReadOperation::Average, ReadOutcome::Scalar(average))
            .await;
        Ok(average)
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn dispose(&self) {
        self.inner.dispose()
    }
}
