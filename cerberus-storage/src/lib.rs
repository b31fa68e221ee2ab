//! Persistent store adapter for the Cerberus data-access engine.
//!
//! [`PersistentStore`] is the seam the orchestrator talks to; [`SqliteStore`]
//! implements it as a document store over one SQLite database:
//!
//! - filters become `json_extract` comparisons on a JSON `data` column
//! - relation and identifier values are coerced to canonical UUIDs
//! - every read and write is owner scoped unless the scope skips ownership
//! - indexes derived from the model are ensured lazily, once per namespace

mod error;
mod indexes;
mod sql;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteConfig, SqliteStore};
pub use store::PersistentStore;
