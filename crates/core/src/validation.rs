//! Validation contracts run by the validation decorator before writes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Every failure found while validating one call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Validation failed: {}", summarize(.failures))]
pub struct ValidationErrors {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn new(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }
}

fn summarize(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks one aggregate and reports every rule it breaks.
pub trait Validator<T>: Send + Sync {
    fn validate(&self, item: &T) -> Vec<ValidationFailure>;
}

impl<T, F> Validator<T> for F
where
    F: Fn(&T) -> Vec<ValidationFailure> + Send + Sync,
{
    fn validate(&self, item: &T) -> Vec<ValidationFailure> {
        self(item)
    }
}

/// The set of validators registered for one repository and type.
pub struct ValidationStrategy<T> {
    validators: Vec<Arc<dyn Validator<T>>>,
}

impl<T> Default for ValidationStrategy<T> {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
        }
    }
}

impl<T> Clone for ValidationStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            validators: self.validators.clone(),
        }
    }
}

impl<T> fmt::Debug for ValidationStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationStrategy")
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl<T> ValidationStrategy<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator<T> + 'static) -> Self {
        self.push(Arc::new(validator));
        self
    }

    pub fn push(&mut self, validator: Arc<dyn Validator<T>>) {
        self.validators.push(validator);
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs every validator and aggregates all failures.
    pub fn validate(&self, item: &T) -> Result<(), ValidationErrors> {
        self.validate_all(std::slice::from_ref(item))
    }

    pub fn validate_all(&self, items: &[T]) -> Result<(), ValidationErrors> {
        let failures: Vec<ValidationFailure> = items
            .iter()
            .flat_map(|item| {
                self.validators
                    .iter()
                    .flat_map(move |validator| validator.validate(item))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(failures))
        }
    }
}
