//! Schema layer of the Cerberus data-access engine.
//!
//! - [`Model`] / [`FieldDescriptor`]: the declarative schema, loadable from
//!   JSON or TOML
//! - [`ModelRegistry`]: the immutable set of models, checked at build
//! - [`ModelScope`]: a model plus the caller's ownership context
//! - [`Mutator`]: the write (hash, encrypt, date) and read (decrypt) pipelines
//! - [`validation`]: structured per-field validation
//!
//! The engine interprets schemas as data; there is no per-model code.

mod coerce;
mod error;
mod introspection;
pub mod mutation;
mod registry;
mod schema;
mod scope;
pub mod validation;

pub use coerce::{coerce_date, coerce_number, format_date, parse_date};
pub use error::{MutationError, MutationResult, RegistryError};
pub use introspection::FieldFlag;
pub use mutation::{Mutation, Mutator, Transform, mutate_query_filters};
pub use registry::{ModelRegistry, ModelRegistryBuilder, RESERVED_FIELDS, is_identifier};
pub use schema::{FieldDescriptor, FieldType, IndexSpec, Model, StringFormat, Validations};
pub use scope::ModelScope;
pub use validation::{
    BatchErrors, FieldError, FieldErrorCode, FieldErrors, ValidationErrors, ValidationOptions,
    validate_entries, validate_entry,
};
