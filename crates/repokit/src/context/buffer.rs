//! Transactional command buffer shared by every storage backend.
//!
//! A backend only has to say how one batch of its commands runs inside a
//! transaction. Queueing, immediate execution, discard and commit hooks are
//! implemented here once.

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use repokit_core::options::RepositoryName;
use repokit_core::storage::{RepositoryError, Result};

use super::UnitOfWorkContext;

/// Work to run once buffered commands have been committed.
pub type CommitHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Runs a batch of backend commands as one transaction.
#[async_trait]
pub trait TransactionalBackend: Send + Sync + 'static {
    type Command: Debug + Send + Sync + 'static;

    /// Executes `commands` in order, all or nothing. Implementations check
    /// `cancel` before each command and roll back when it fires.
    async fn execute(&self, commands: Vec<Self::Command>, cancel: &CancellationToken)
        -> Result<()>;
}

/// Whether writes wait for `save_changes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Every command runs as its own single-command batch.
    Immediate,
    /// Commands queue until `save_changes`.
    Deferred,
}

#[derive(Debug)]
struct Configured<B> {
    name: RepositoryName,
    backend: B,
}

/// Queue of pending commands for one backend.
///
/// Unconfigured until [`configure`](Self::configure) binds it to a repository
/// name and backend handle. Enqueue is safe from many tasks at once;
/// `save_changes` drains the whole queue at its start, so commands enqueued
/// while a save is running wait for the next save.
pub struct CommandBuffer<B: TransactionalBackend> {
    mode: BufferMode,
    configured: OnceLock<Configured<B>>,
    queue: Mutex<Vec<B::Command>>,
    hooks: Mutex<Vec<CommitHook>>,
}

impl<B: TransactionalBackend> Debug for CommandBuffer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("mode", &self.mode)
            .field("repository", &self.repository_name())
            .field("pending", &lock(&self.queue).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: TransactionalBackend> CommandBuffer<B> {
    pub fn new(mode: BufferMode) -> Self {
        Self {
            mode,
            configured: OnceLock::new(),
            queue: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn immediate() -> Self {
        Self::new(BufferMode::Immediate)
    }

    pub fn deferred() -> Self {
        Self::new(BufferMode::Deferred)
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Binds the buffer to a repository and backend.
    ///
    /// Only the first call has an effect. Returns whether this call did the
    /// configuration.
    pub fn configure(&self, name: RepositoryName, backend: B) -> bool {
        let mut fresh = false;
        let configured = self.configured.get_or_init(|| {
            fresh = true;
            Configured {
                name: name.clone(),
                backend,
            }
        });

        if fresh {
            tracing::debug!(repository = %name, mode = ?self.mode, "Context configured");
        } else if configured.name != name {
            tracing::warn!(
                repository = %configured.name,
                requested = %name,
                "Context already configured, ignoring reconfiguration"
            );
        }
        fresh
    }

    pub fn is_configured(&self) -> bool {
        self.configured.get().is_some()
    }

    pub fn backend(&self) -> Result<&B> {
        self.configured
            .get()
            .map(|configured| &configured.backend)
            .ok_or(RepositoryError::ContextNotConfigured)
    }

    pub fn repository_name(&self) -> Option<&RepositoryName> {
        self.configured.get().map(|configured| &configured.name)
    }

    /// Runs the command now in immediate mode, otherwise queues it.
    pub async fn add_command(&self, command: B::Command) -> Result<()> {
        let backend = self.backend()?;

        match self.mode {
            BufferMode::Immediate => {
                tracing::trace!(command = ?command, "Executing command");
                backend
                    .execute(vec![command], &CancellationToken::new())
                    .await
            }
            BufferMode::Deferred => {
                tracing::trace!(command = ?command, "Buffering command");
                lock(&self.queue).push(command);
                Ok(())
            }
        }
    }

    /// Like [`add_command`](Self::add_command) for a group of commands that
    /// must succeed or fail together. Immediate mode runs them as one batch.
    pub async fn add_commands(&self, commands: Vec<B::Command>) -> Result<()> {
        let backend = self.backend()?;
        if commands.is_empty() {
            return Ok(());
        }

        match self.mode {
            BufferMode::Immediate => {
                tracing::trace!(commands = commands.len(), "Executing command batch");
                backend.execute(commands, &CancellationToken::new()).await
            }
            BufferMode::Deferred => {
                tracing::trace!(commands = commands.len(), "Buffering command batch");
                lock(&self.queue).extend(commands);
                Ok(())
            }
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn has_changes(&self) -> bool {
        !lock(&self.queue).is_empty()
    }

    /// Drops every queued command and commit hook without running them.
    pub fn discard_changes(&self) {
        let discarded = std::mem::take(&mut *lock(&self.queue)).len();
        lock(&self.hooks).clear();
        if discarded > 0 {
            tracing::debug!(
                repository = ?self.repository_name(),
                discarded,
                "Discarded pending changes"
            );
        }
    }

    /// Registers work to run after the next successful commit.
    ///
    /// In immediate mode every command is already committed, so the hook
    /// runs right away.
    pub async fn after_commit(&self, hook: CommitHook) {
        match self.mode {
            BufferMode::Immediate => hook().await,
            BufferMode::Deferred => lock(&self.hooks).push(hook),
        }
    }

    /// Executes every queued command in one transaction.
    ///
    /// The queue is empty afterwards whether the save succeeded or not.
    /// Commit hooks run only on success.
    pub async fn save_changes(&self, cancel: &CancellationToken) -> Result<()> {
        let backend = self.backend()?;
        let commands = std::mem::take(&mut *lock(&self.queue));
        let hooks = std::mem::take(&mut *lock(&self.hooks));

        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        if !commands.is_empty() {
            let count = commands.len();
            tracing::debug!(repository = ?self.repository_name(), count, "Saving changes");

            if let Err(e) = backend.execute(commands, cancel).await {
                tracing::debug!(
                    repository = ?self.repository_name(),
                    error = %e,
                    "Save failed, changes rolled back"
                );
                return Err(e);
            }
        }

        for hook in hooks {
            hook().await;
        }
        Ok(())
    }
}

#[async_trait]
impl<B: TransactionalBackend> UnitOfWorkContext for CommandBuffer<B> {
    fn repository_name(&self) -> Option<RepositoryName> {
        CommandBuffer::repository_name(self).cloned()
    }

    fn is_immediate(&self) -> bool {
        self.mode == BufferMode::Immediate
    }

    fn has_changes(&self) -> bool {
        CommandBuffer::has_changes(self)
    }

    fn discard_changes(&self) {
        CommandBuffer::discard_changes(self)
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> Result<()> {
        CommandBuffer::save_changes(self, cancel).await
    }

    async fn after_commit(&self, hook: CommitHook) {
        CommandBuffer::after_commit(self, hook).await
    }
}
