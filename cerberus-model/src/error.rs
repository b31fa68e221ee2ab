//! Error types for the model layer.

use cerberus_crypto::CryptoError;
use thiserror::Error;

/// Result type for mutation pipeline operations.
pub type MutationResult<T> = Result<T, MutationError>;

/// Errors raised while transforming entry values.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Cipher or hasher failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A transform received a value it cannot handle.
    #[error("cannot {transform} a {kind} value in field '{field}'")]
    UnsupportedValue {
        transform: &'static str,
        field: String,
        kind: &'static str,
    },
}

/// Errors raised while building a [`crate::ModelRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model '{0}' is already registered")]
    DuplicateName(String),

    #[error("namespace '{namespace}' is already used by model '{existing}'")]
    DuplicateNamespace { namespace: String, existing: String },

    #[error("{kind} '{value}' is not a plain identifier")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("field '{field}' of model '{model}' is reserved")]
    ReservedField { model: String, field: String },

    #[error("field '{field}' of model '{model}' references unknown model '{target}'")]
    UnknownRelation {
        model: String,
        field: String,
        target: String,
    },

    #[error("index of model '{model}' names unknown field '{field}'")]
    UnknownIndexField { model: String, field: String },

    #[error("unknown model '{0}'")]
    UnknownModel(String),
}

/// Short name of a JSON value's kind, for error messages.
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
