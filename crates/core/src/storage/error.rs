use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Invalid argument `{parameter}`: {message}")]
    InvalidArgument {
        parameter: &'static str,
        message: String,
    },
    #[error("Repository has been disposed")]
    Disposed,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Unit of work has not been initialized")]
    NotInitialized,
    #[error("Repository context has not been configured")]
    ContextNotConfigured,
    #[error("Unknown repository: {0}")]
    UnknownRepository(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Domain event handler failed: {0}")]
    EventHandler(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    pub fn invalid_argument(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity_type: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity_type,
            id: id.to_string(),
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationFailure;

    #[test]
    fn test_repository_error_not_found_display() {
        let error = RepositoryError::not_found("Person", "abc-123");
        assert_eq!(error.to_string(), "Person not found: abc-123");
    }

    #[test]
    fn test_repository_error_already_exists_display() {
        let error = RepositoryError::already_exists("Person", 7);
        assert_eq!(error.to_string(), "Person already exists: 7");
    }

    #[test]
    fn test_invalid_argument_display() {
        let error = RepositoryError::invalid_argument("id", "cannot be blank");
        assert_eq!(error.to_string(), "Invalid argument `id`: cannot be blank");
    }

    #[test]
    fn test_validation_errors_convert() {
        let errors = ValidationErrors::new(vec![ValidationFailure::new("name", "is required")]);

        let error: RepositoryError = errors.clone().into();

        assert_eq!(error, RepositoryError::Validation(errors));
        assert_eq!(error.to_string(), "Validation failed: name: is required");
    }

    #[test]
    fn test_repository_error_connection_failed_display() {
        let error = RepositoryError::ConnectionFailed("timeout after 30s".to_string());
        assert_eq!(error.to_string(), "Connection failed: timeout after 30s");
    }

    #[test]
    fn test_repository_error_serialization_display() {
        let error = RepositoryError::Serialization("missing required field".to_string());
        assert_eq!(
            error.to_string(),
            "Serialization error: missing required field"
        );
    }
}
