//! Error taxonomy of the orchestrator.

use cerberus_cache::CacheError;
use cerberus_crypto::CryptoError;
use cerberus_model::{MutationError, ValidationErrors};
use cerberus_storage::StoreError;
use cerberus_types::QueryError;
use thiserror::Error;

pub type AccessResult<T> = Result<T, DataAccessError>;

#[derive(Debug, Error)]
pub enum DataAccessError {
    /// The payload or request failed validation. `errors` carries the
    /// per-field (or per-entry) details when validation produced them.
    #[error("{message}")]
    BadRequest {
        message: String,
        errors: Option<ValidationErrors>,
    },

    #[error("{model} '{id}' not found")]
    NotFound { model: String, id: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("mutation error: {0}")]
    Mutation(#[from] MutationError),
}

impl DataAccessError {
    pub fn bad_request(message: impl Into<String>, errors: ValidationErrors) -> Self {
        Self::BadRequest {
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::AccessDenied(_) => 403,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// The structured validation errors, if any.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::BadRequest { errors, .. } => errors.as_ref(),
            _ => None,
        }
    }
}

impl From<QueryError> for DataAccessError {
    fn from(err: QueryError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
            errors: None,
        }
    }
}

impl From<CryptoError> for DataAccessError {
    fn from(err: CryptoError) -> Self {
        Self::Mutation(MutationError::Crypto(err))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid crypto key: {0}")]
    Crypto(#[from] CryptoError),
}
