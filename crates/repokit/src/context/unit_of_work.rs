use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use repokit_core::entity::AggregateRoot;
use repokit_core::options::{RepositoryName, RepositoryOptions};
use repokit_core::storage::{Repository, RepositoryError, Result};

use super::BufferMode;
use crate::registry::{ContextHandle, RepositoryRegistry};

#[derive(Debug)]
struct Initialized {
    name: RepositoryName,
    options: RepositoryOptions,
    context: ContextHandle,
}

/// Groups writes to one named repository into a single commit.
///
/// Every repository resolved from the same unit of work shares one context.
/// For a repository registered with `unit_of_work` the context is deferred:
/// writes queue until [`save_changes`](Self::save_changes) and are invisible
/// to reads until then. Otherwise writes apply at once and `save_changes` has
/// nothing to do. Separate units of work never share a queue.
#[derive(Debug)]
pub struct UnitOfWork {
    registry: Arc<RepositoryRegistry>,
    state: OnceLock<Initialized>,
}

impl UnitOfWork {
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            registry,
            state: OnceLock::new(),
        }
    }

    /// Binds the unit of work to repository `name`. Allowed once.
    pub async fn initialize(&self, name: impl Into<RepositoryName>) -> Result<()> {
        let name = name.into();
        if let Some(current) = self.state.get() {
            return Err(already_initialized(&current.name));
        }

        let options = self.registry.options(&name)?.clone();
        let backend = self.registry.backend(&name, &options).await?;
        let mode = if options.unit_of_work {
            BufferMode::Deferred
        } else {
            BufferMode::Immediate
        };
        let context = ContextHandle::open(name.clone(), backend, mode);

        self.state
            .set(Initialized {
                name: name.clone(),
                options,
                context,
            })
            .map_err(|lost| already_initialized(&lost.name))?;
        tracing::debug!(repository = %name, ?mode, "Unit of work initialized");
        Ok(())
    }

    fn state(&self) -> Result<&Initialized> {
        self.state.get().ok_or(RepositoryError::NotInitialized)
    }

    pub fn repository_name(&self) -> Option<&RepositoryName> {
        self.state.get().map(|state| &state.name)
    }

    /// Full pipeline for `T` writing through this unit of work.
    pub fn repository<T: AggregateRoot>(&self) -> Result<Arc<dyn Repository<T>>> {
        let state = self.state()?;
        Ok(self
            .registry
            .pipeline::<T>(&state.name, &state.options, &state.context))
    }

    pub async fn save_changes(&self, cancel: &CancellationToken) -> Result<()> {
        self.state()?.context.as_context().save_changes(cancel).await
    }

    pub fn discard_changes(&self) -> Result<()> {
        self.state()?.context.as_context().discard_changes();
        Ok(())
    }

    pub fn has_changes(&self) -> Result<bool> {
        Ok(self.state()?.context.as_context().has_changes())
    }
}

fn already_initialized(name: &RepositoryName) -> RepositoryError {
    RepositoryError::InvalidOperation(format!(
        "unit of work is already initialized for repository `{name}`"
    ))
}
