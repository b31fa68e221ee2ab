//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite, including unique index violations.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reference value is not a valid identifier.
    #[error("invalid reference in field '{field}': {value}")]
    InvalidReference { field: String, value: String },

    /// A field name cannot be used in a query.
    #[error("invalid field name: {0}")]
    InvalidField(String),

    /// A batch update element has no identifier.
    #[error("entry at position {0} has no identifier")]
    MissingIdentifier(usize),

    /// The connection mutex was poisoned by a panicking task.
    #[error("connection lock poisoned")]
    Poisoned,

    /// A blocking storage task failed to complete.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Whether this error is a unique or primary-key constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
