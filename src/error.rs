//! Error taxonomy for the fraud detection core.
//!
//! Validation and not-found errors are the only ones a caller ever sees;
//! assessor failures are recovered by falling back to the rule path, and
//! persistence failures after a durable append degrade to a logged gap
//! instead of surfacing.

use thiserror::Error;

/// A single rejected input field with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Malformed or out-of-range input, reported to the caller and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", self.summary())]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    #[must_use]
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Shorthand for a single-field rejection.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("assessor unavailable: {0}")]
    AssessorUnavailable(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
