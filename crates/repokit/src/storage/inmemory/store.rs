use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use repokit_core::storage::{RepositoryError, Result};

use crate::context::TransactionalBackend;
use crate::storage::{DocumentCommand, DocumentStore, KeySequences};

#[derive(Debug, Default)]
struct Collection {
    next_position: u64,
    documents: HashMap<String, (u64, Value)>,
}

type Collections = HashMap<&'static str, Collection>;

/// Reverses one applied command.
enum Undo {
    Inserted {
        collection: &'static str,
        id: String,
        position: u64,
    },
    /// Puts back the document a replace or delete displaced.
    Restore {
        collection: &'static str,
        id: String,
        entry: (u64, Value),
    },
}

/// Thread-safe in-memory document store.
///
/// A batch is applied in place under the write lock and undone in reverse
/// order if any command fails, so readers never see half a batch.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
    sequences: KeySequences,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply(collections: &mut Collections, command: DocumentCommand) -> Result<Undo> {
    match command {
        DocumentCommand::Insert {
            collection,
            id,
            document,
        } => {
            let collection_data = collections.entry(collection).or_default();
            if collection_data.documents.contains_key(&id) {
                return Err(RepositoryError::already_exists(collection, id));
            }
            let position = collection_data.next_position;
            collection_data.next_position += 1;
            collection_data
                .documents
                .insert(id.clone(), (position, document));
            Ok(Undo::Inserted {
                collection,
                id,
                position,
            })
        }
        DocumentCommand::Replace {
            collection,
            id,
            document,
        } => {
            let slot = collections
                .get_mut(collection)
                .and_then(|data| data.documents.get_mut(&id))
                .ok_or_else(|| RepositoryError::not_found(collection, id.clone()))?;
            let previous = std::mem::replace(&mut slot.1, document);
            let entry = (slot.0, previous);
            Ok(Undo::Restore {
                collection,
                id,
                entry,
            })
        }
        DocumentCommand::Delete { collection, id } => {
            let entry = collections
                .get_mut(collection)
                .and_then(|data| data.documents.remove(&id))
                .ok_or_else(|| RepositoryError::not_found(collection, id.clone()))?;
            Ok(Undo::Restore {
                collection,
                id,
                entry,
            })
        }
    }
}

fn rollback(collections: &mut Collections, applied: Vec<Undo>) {
    for undo in applied.into_iter().rev() {
        match undo {
            Undo::Inserted {
                collection,
                id,
                position,
            } => {
                if let Some(data) = collections.get_mut(collection) {
                    data.documents.remove(&id);
                    data.next_position = position;
                }
            }
            Undo::Restore {
                collection,
                id,
                entry,
            } => {
                collections
                    .entry(collection)
                    .or_default()
                    .documents
                    .insert(id, entry);
            }
        }
    }
}

#[async_trait]
impl TransactionalBackend for InMemoryStore {
    type Command = DocumentCommand;

    async fn execute(&self, commands: Vec<DocumentCommand>, cancel: &CancellationToken) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut applied = Vec::with_capacity(commands.len());

        for command in commands {
            let step = if cancel.is_cancelled() {
                Err(RepositoryError::Cancelled)
            } else {
                apply(&mut collections, command)
            };

            match step {
                Ok(undo) => applied.push(undo),
                Err(e) => {
                    tracing::debug!(undone = applied.len(), error = %e, "Rolling back batch");
                    rollback(&mut collections, applied);
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn sequences(&self) -> &KeySequences {
        &self.sequences
    }

    async fn load(&self, collection: &'static str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|data| data.documents.get(id))
            .map(|(_, document)| document.clone()))
    }

    async fn load_all(&self, collection: &'static str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut documents: Vec<_> = data.documents.values().collect();
        documents.sort_by_key(|(position, _)| *position);
        Ok(documents
            .into_iter()
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn count(&self, collection: &'static str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map_or(0, |data| data.documents.len()))
    }
}
