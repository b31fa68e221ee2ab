//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A node could not serve the request.
    #[error("cache node '{node}' unavailable")]
    NodeUnavailable { node: String },

    /// A counter key holds something other than an integer.
    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),

    /// An entry without an identifier cannot be cached.
    #[error("cannot cache an entry without an identifier")]
    MissingIdentifier,

    /// No quorum could be reached for the lock.
    #[error("lock '{resource}' unavailable after {attempts} attempts")]
    LockUnavailable { resource: String, attempts: u32 },

    /// A cache needs at least one node.
    #[error("no cache nodes configured")]
    NoNodes,
}
