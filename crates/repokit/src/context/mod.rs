//! Repository contexts: buffered backend commands and the unit of work.

mod buffer;
mod unit_of_work;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use repokit_core::options::RepositoryName;
use repokit_core::storage::Result;

pub use buffer::{BufferMode, CommandBuffer, CommitHook, TransactionalBackend};
pub use unit_of_work::UnitOfWork;

/// Backend independent view of a context, used by decorators and the unit
/// of work.
#[async_trait]
pub trait UnitOfWorkContext: Send + Sync {
    fn repository_name(&self) -> Option<RepositoryName>;

    /// True when writes are applied as they are issued.
    fn is_immediate(&self) -> bool;

    fn has_changes(&self) -> bool;

    fn discard_changes(&self);

    async fn save_changes(&self, cancel: &CancellationToken) -> Result<()>;

    async fn after_commit(&self, hook: CommitHook);
}
