//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `RepositoryError`.
//! Errors raised inside a connection closure travel as `Error::Other` and
//! are unwrapped unchanged.

use repokit_core::storage::RepositoryError;

/// Wraps a rusqlite error for tokio_rusqlite closures.
pub fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// Carries a repository error out of a connection closure.
pub fn wrap_repository_err(e: RepositoryError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e))
}

/// Maps a rusqlite error to a RepositoryError.
///
/// # Error Mapping
///
/// - `SQLITE_CONSTRAINT_PRIMARYKEY` / `SQLITE_CONSTRAINT_UNIQUE` → `AlreadyExists`
/// - Connection errors → `ConnectionFailed`
/// - All other errors → `QueryFailed`
fn map_rusqlite_error(err: &rusqlite::Error, collection: &'static str, id: &str) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepositoryError::already_exists(collection, id)
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::CannotOpen =>
        {
            RepositoryError::ConnectionFailed(format!("Cannot open database: {err}"))
        }

        rusqlite::Error::QueryReturnedNoRows => RepositoryError::not_found(collection, id),

        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a RepositoryError.
///
/// `id` names the document involved, when there is a single one.
pub fn map_tokio_rusqlite_error(
    err: tokio_rusqlite::Error,
    collection: &'static str,
    id: &str,
) -> RepositoryError {
    match err {
        tokio_rusqlite::Error::Rusqlite(ref rusqlite_err) => {
            map_rusqlite_error(rusqlite_err, collection, id)
        }
        tokio_rusqlite::Error::Close(_) | tokio_rusqlite::Error::ConnectionClosed => {
            RepositoryError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        tokio_rusqlite::Error::Other(inner) => match inner.downcast::<RepositoryError>() {
            Ok(repository_err) => *repository_err,
            Err(other) => RepositoryError::QueryFailed(other.to_string()),
        },
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    #[test]
    fn test_primary_key_violation_maps_to_already_exists() {
        let sqlite_err = rusqlite::ffi::Error {
            code: rusqlite::ErrorCode::ConstraintViolation,
            extended_code: ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
        };
        let err = wrap_err(rusqlite::Error::SqliteFailure(sqlite_err, None));

        let result = map_tokio_rusqlite_error(err, "Person", "abc-123");

        assert_eq!(result, RepositoryError::already_exists("Person", "abc-123"));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err = wrap_err(rusqlite::Error::QueryReturnedNoRows);

        let result = map_tokio_rusqlite_error(err, "Person", "7");

        match result {
            RepositoryError::NotFound { entity_type, id } => {
                assert_eq!(entity_type, "Person");
                assert_eq!(id, "7");
            }
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_repository_error_passes_through() {
        let err = wrap_repository_err(RepositoryError::Cancelled);

        let result = map_tokio_rusqlite_error(err, "Person", "");

        assert_eq!(result, RepositoryError::Cancelled);
    }

    #[test]
    fn test_foreign_error_maps_to_query_failed() {
        let err = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));

        let result = map_tokio_rusqlite_error(err, "Person", "");

        assert!(matches!(result, RepositoryError::QueryFailed(_)));
    }
}
