//! Persistent store abstraction.

use crate::error::StoreResult;
use async_trait::async_trait;
use cerberus_model::ModelScope;
use cerberus_types::{Count, Entry, Query};

/// Document store backing the orchestrator.
///
/// Every call carries the caller's scope: implementations add an owner
/// clause to reads, updates and deletes unless the scope skips ownership,
/// and stamp the owner on insertion. Identifiers are taken in their
/// external string form.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn search(&self, scope: &ModelScope, query: &Query) -> StoreResult<Vec<Entry>>;

    async fn count(&self, scope: &ModelScope, query: &Query) -> StoreResult<Count>;

    /// A malformed `id` is reported as absent, not as an error.
    async fn get(&self, scope: &ModelScope, id: &str) -> StoreResult<Option<Entry>>;

    async fn get_all(&self, scope: &ModelScope) -> StoreResult<Vec<Entry>>;

    async fn insert(&self, scope: &ModelScope, entry: Entry) -> StoreResult<Entry>;

    /// Inserts one by one; a failure stops the batch and keeps earlier rows.
    async fn batch_insert(&self, scope: &ModelScope, entries: Vec<Entry>) -> StoreResult<Vec<Entry>>;

    /// Sets present values and unsets null or empty ones. Returns the entry
    /// after the update, or `None` when nothing matched.
    async fn update(&self, scope: &ModelScope, id: &str, entry: Entry) -> StoreResult<Option<Entry>>;

    /// Updates entries by their own identifiers and returns those that exist.
    async fn batch_update(&self, scope: &ModelScope, entries: Vec<Entry>) -> StoreResult<Vec<Entry>>;

    async fn delete(&self, scope: &ModelScope, id: &str) -> StoreResult<()>;

    async fn batch_delete(&self, scope: &ModelScope, ids: &[String]) -> StoreResult<()>;
}
