use modkit_db::StorageError;
use modkit_query::InvalidFilterError;
use serde_json::Value;
use thiserror::Error;

/// URL template parsing or rendering failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder at byte {offset} in '{template}'")]
    Unterminated { template: String, offset: usize },

    #[error("empty placeholder at byte {offset} in '{template}'")]
    EmptyField { template: String, offset: usize },

    #[error("template field '{field}' is missing or null")]
    MissingField { field: String },
}

/// A create/update payload does not satisfy the caller's constraint.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("field '{field}' violates constraint {constraint}: got {actual}")]
pub struct ConstraintViolationError {
    pub field: String,
    /// Human-readable form of the violated comparison, e.g. `$eq 2`.
    pub constraint: String,
    /// Offending payload value (`null` when the field was absent).
    pub actual: Value,
}

/// Error returned by collection operations.
///
/// "Not found" is never an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolationError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CollectionError {
    /// Returns `true` for errors caused by the request rather than the engine.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidFilter(_) | Self::ConstraintViolation(_))
    }
}
