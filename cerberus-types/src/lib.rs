//! Core type definitions for the Cerberus data-access engine.
//!
//! This crate defines the store-agnostic types that every other crate
//! exchanges:
//! - [`EntryId`]: entry and owner identifiers (UUID v7)
//! - [`Entry`]: one document of a model (system fields plus JSON fields)
//! - [`Query`] / [`Filter`]: the store-agnostic query shape
//!
//! Nothing here knows about schemas or backing stores.

mod entry;
mod ids;
mod query;

pub use entry::{Count, Entry, ID_FIELD, OWNER_FIELD};
pub use ids::EntryId;
pub use query::{
    Filter, Filters, OPERATORS, Operators, Query, QueryError, QueryLimits, SortDirection,
    SortField,
};
