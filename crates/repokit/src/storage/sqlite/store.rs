use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tokio_rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use repokit_core::storage::{RepositoryError, Result};

use super::error::{map_tokio_rusqlite_error, wrap_err, wrap_repository_err};
use super::schema;
use crate::context::TransactionalBackend;
use crate::storage::{DocumentCommand, DocumentStore, KeySequences};

/// SQLite-backed document store.
///
/// Cloning shares the underlying connection and key sequences.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    sequences: KeySequences,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens a file-based database, creating the file and schema if needed.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Self::open_in_memory().await;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;
        Self::init_schema(&conn).await?;
        tracing::debug!(path, "SQLite store opened");

        Ok(Self {
            conn,
            sequences: KeySequences::default(),
        })
    }

    /// Opens an in-memory database. Data is lost when the last clone drops.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;
        Self::init_schema(&conn).await?;

        Ok(Self {
            conn,
            sequences: KeySequences::default(),
        })
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES).map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }
}

fn encode(document: &Value) -> std::result::Result<String, tokio_rusqlite::Error> {
    serde_json::to_string(document)
        .map_err(|e| wrap_repository_err(RepositoryError::Serialization(e.to_string())))
}

fn decode(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

/// Applies one command inside an open transaction.
fn apply(
    tx: &rusqlite::Transaction<'_>,
    command: &DocumentCommand,
) -> std::result::Result<(), tokio_rusqlite::Error> {
    match command {
        DocumentCommand::Insert {
            collection,
            id,
            document,
        } => {
            tx.execute(schema::INSERT_DOCUMENT, params![collection, id, encode(document)?])
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(ref failure, _)
                        if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        wrap_repository_err(RepositoryError::already_exists(*collection, id))
                    }
                    other => wrap_err(other),
                })?;
        }
        DocumentCommand::Replace {
            collection,
            id,
            document,
        } => {
            let changed = tx
                .execute(schema::REPLACE_DOCUMENT, params![collection, id, encode(document)?])
                .map_err(wrap_err)?;
            if changed == 0 {
                return Err(wrap_repository_err(RepositoryError::not_found(*collection, id)));
            }
        }
        DocumentCommand::Delete { collection, id } => {
            let changed = tx
                .execute(schema::DELETE_DOCUMENT, params![collection, id])
                .map_err(wrap_err)?;
            if changed == 0 {
                return Err(wrap_repository_err(RepositoryError::not_found(*collection, id)));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl TransactionalBackend for SqliteStore {
    type Command = DocumentCommand;

    async fn execute(&self, commands: Vec<DocumentCommand>, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.clone();

        self.conn
            .call(move |conn| {
                // Dropping the transaction without commit rolls it back.
                let tx = conn.transaction().map_err(wrap_err)?;
                for command in &commands {
                    if cancel.is_cancelled() {
                        return Err(wrap_repository_err(RepositoryError::Cancelled));
                    }
                    apply(&tx, command)?;
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "document", ""))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn sequences(&self) -> &KeySequences {
        &self.sequences
    }

    async fn load(&self, collection: &'static str, id: &str) -> Result<Option<Value>> {
        let id = id.to_string();
        let lookup_id = id.clone();

        let body = self
            .conn
            .call(move |conn| {
                conn.query_row(schema::SELECT_DOCUMENT, params![collection, lookup_id], |row| {
                    row.get::<_, String>(0)
                })
                .optional()
                .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, collection, &id))?;

        body.as_deref().map(decode).transpose()
    }

    async fn load_all(&self, collection: &'static str) -> Result<Vec<Value>> {
        let bodies = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(schema::SELECT_DOCUMENTS).map_err(wrap_err)?;
                let rows = stmt
                    .query_map([collection], |row| row.get::<_, String>(0))
                    .map_err(wrap_err)?;

                let mut bodies = Vec::new();
                for row_result in rows {
                    bodies.push(row_result.map_err(wrap_err)?);
                }
                Ok(bodies)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, collection, ""))?;

        bodies.iter().map(|body| decode(body)).collect()
    }

    async fn count(&self, collection: &'static str) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                conn.query_row(schema::COUNT_DOCUMENTS, [collection], |row| row.get::<_, i64>(0))
                    .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, collection, ""))?;

        usize::try_from(count).map_err(|e| RepositoryError::InvalidData(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert(id: &str, age: i64) -> DocumentCommand {
        DocumentCommand::Insert {
            collection: "Person",
            id: id.to_string(),
            document: json!({ "id": id, "age": age }),
        }
    }

    #[tokio::test]
    async fn test_insert_load_count() {
        let store = SqliteStore::open_in_memory().await.unwrap();

        store
            .execute(vec![insert("b", 2), insert("a", 1)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            store.load("Person", "a").await.unwrap(),
            Some(json!({ "id": "a", "age": 1 }))
        );
        assert_eq!(store.load("Person", "z").await.unwrap(), None);
        assert_eq!(store.count("Person").await.unwrap(), 2);
        assert_eq!(store.count("Other").await.unwrap(), 0);

        let ids: Vec<_> = store
            .load_all("Person")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .execute(vec![insert("a", 1)], &CancellationToken::new())
            .await
            .unwrap();

        let replace = DocumentCommand::Replace {
            collection: "Person",
            id: "a".to_string(),
            document: json!({ "id": "a", "age": 5 }),
        };
        store.execute(vec![replace], &CancellationToken::new()).await.unwrap();
        assert_eq!(store.load("Person", "a").await.unwrap().unwrap()["age"], 5);

        let delete = DocumentCommand::Delete {
            collection: "Person",
            id: "a".to_string(),
        };
        store.execute(vec![delete], &CancellationToken::new()).await.unwrap();
        assert_eq!(store.load("Person", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_maps_to_already_exists() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .execute(vec![insert("a", 1)], &CancellationToken::new())
            .await
            .unwrap();

        let result = store
            .execute(vec![insert("a", 2)], &CancellationToken::new())
            .await;

        assert_eq!(result, Err(RepositoryError::already_exists("Person", "a")));
    }

    #[tokio::test]
    async fn test_failed_batch_is_rolled_back() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let missing = DocumentCommand::Delete {
            collection: "Person",
            id: "missing".to_string(),
        };

        let result = store
            .execute(vec![insert("a", 1), missing], &CancellationToken::new())
            .await;

        assert_eq!(result, Err(RepositoryError::not_found("Person", "missing")));
        assert_eq!(store.count("Person").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_is_rolled_back() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store.execute(vec![insert("a", 1)], &cancel).await;

        assert_eq!(result, Err(RepositoryError::Cancelled));
        assert_eq!(store.count("Person").await.unwrap(), 0);
    }
}
