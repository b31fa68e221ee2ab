//! The data-access orchestrator.
//!
//! Every operation runs the same pipeline around the stores: validate,
//! encode for write, persist, refresh the cache, decode for read. Persistent
//! writes precede cache writes; cache deletes precede persistent deletes.

use crate::config::{AccessConfig, CerberusConfig};
use crate::counter::{Incrementer, Limiter};
use crate::error::{AccessResult, ConfigError, DataAccessError};
use cerberus_cache::{CacheStore, KvCache, Lock};
use cerberus_crypto::FieldCrypto;
use cerberus_model::{
    ModelScope, Mutator, ValidationErrors, ValidationOptions, mutate_query_filters,
    validate_entries, validate_entry,
};
use cerberus_storage::{PersistentStore, SqliteStore};
use cerberus_types::{Count, Entry, ID_FIELD, OWNER_FIELD, Query};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct DataAccess {
    store: Arc<dyn PersistentStore>,
    cache: Option<Arc<dyn CacheStore>>,
    mutator: Mutator,
    config: AccessConfig,
}

impl DataAccess {
    pub fn new(store: Arc<dyn PersistentStore>, crypto: Arc<FieldCrypto>, config: AccessConfig) -> Self {
        Self {
            store,
            cache: None,
            mutator: Mutator::new(crypto),
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wires a SQLite store, an in-process cache when enabled, and the
    /// configured crypto.
    pub fn from_config(config: &CerberusConfig) -> Result<Self, ConfigError> {
        let crypto = FieldCrypto::new(config.crypto.cipher_key()?, config.crypto.hash_params());
        let store = Arc::new(SqliteStore::new(config.storage.clone()));
        let access = Self::new(store, Arc::new(crypto), config.access);
        info!(
            path = ?config.storage.path,
            cache = config.cache.enabled,
            "data access configured"
        );
        if config.cache.enabled {
            Ok(access.with_cache(Arc::new(KvCache::in_memory(config.cache.clone()))))
        } else {
            Ok(access)
        }
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    pub fn mutator(&self) -> &Mutator {
        &self.mutator
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// The cache, when the scope's model is cached.
    fn cache_for(&self, scope: &ModelScope) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref().filter(|_| scope.model().cache)
    }

    fn require_cache(&self) -> AccessResult<&Arc<dyn CacheStore>> {
        self.cache
            .as_ref()
            .ok_or_else(|| DataAccessError::Configuration("no cache store configured".to_string()))
    }

    async fn decode(&self, scope: &ModelScope, entry: Entry) -> AccessResult<Entry> {
        Ok(self.mutator.mutate_for_read(scope.model(), entry).await?)
    }

    async fn decode_many(&self, scope: &ModelScope, entries: Vec<Entry>) -> AccessResult<Vec<Entry>> {
        Ok(self.mutator.mutate_many_for_read(scope.model(), entries).await?)
    }

    fn not_found(scope: &ModelScope, id: &str) -> DataAccessError {
        DataAccessError::NotFound {
            model: scope.model().name.clone(),
            id: id.to_string(),
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn get(&self, scope: &ModelScope, id: &str) -> AccessResult<Entry> {
        if let Some(cache) = self.cache_for(scope)
            && let Some(hit) = cache.get(scope, id).await?
        {
            return self.decode(scope, hit).await;
        }

        let entry = self
            .store
            .get(scope, id)
            .await?
            .ok_or_else(|| Self::not_found(scope, id))?;
        if let Some(cache) = self.cache_for(scope) {
            cache.set(scope, &entry).await?;
        }
        self.decode(scope, entry).await
    }

    pub async fn get_all(&self, scope: &ModelScope) -> AccessResult<Vec<Entry>> {
        let entries = self.store.get_all(scope).await?;
        self.decode_many(scope, entries).await
    }

    pub async fn search(&self, scope: &ModelScope, query: Query) -> AccessResult<Vec<Entry>> {
        self.validate_projection(scope, &query.fields)?;
        let limit = self.config.effective_limit(query.limit);
        let query = Query {
            filters: mutate_query_filters(scope.model(), query.filters),
            limit: Some(limit),
            ..query
        };
        debug!(model = %scope.model().name, limit, offset = query.offset, "search");
        let entries = self.store.search(scope, &query).await?;
        self.decode_many(scope, entries).await
    }

    pub async fn count(&self, scope: &ModelScope, query: Query) -> AccessResult<Count> {
        let query = Query {
            filters: mutate_query_filters(scope.model(), query.filters),
            ..Query::default()
        };
        Ok(self.store.count(scope, &query).await?)
    }

    // ── Writes ───────────────────────────────────────────────────

    pub async fn insert(&self, scope: &ModelScope, entry: Entry) -> AccessResult<Entry> {
        let model = scope.model();
        validate_entry(model, &entry, ValidationOptions::insertion()).map_err(|errors| {
            DataAccessError::bad_request(
                format!("invalid {} entry", model.name),
                ValidationErrors::Entry(errors),
            )
        })?;

        let encoded = self.mutator.mutate_for_write(model, entry).await?;
        let inserted = self.store.insert(scope, encoded).await?;
        if let Some(cache) = self.cache_for(scope) {
            cache.set(scope, &inserted).await?;
        }
        self.decode(scope, inserted).await
    }

    pub async fn batch_insert(&self, scope: &ModelScope, entries: Vec<Entry>) -> AccessResult<Vec<Entry>> {
        let model = scope.model();
        validate_entries(model, &entries, ValidationOptions::insertion()).map_err(|errors| {
            DataAccessError::bad_request(
                format!("invalid {} entries", model.name),
                ValidationErrors::Batch(errors),
            )
        })?;

        let encoded = self.mutator.mutate_many_for_write(model, entries).await?;
        let inserted = self.store.batch_insert(scope, encoded).await?;
        if let Some(cache) = self.cache_for(scope) {
            cache.set_multiple(scope, &inserted).await?;
        }
        self.decode_many(scope, inserted).await
    }

    /// Partial update of one entry. Null or empty values unset their field.
    pub async fn update(&self, scope: &ModelScope, id: &str, data: Entry) -> AccessResult<Entry> {
        let model = scope.model();
        let options = ValidationOptions::update(scope.restrictions_relaxed());
        validate_entry(model, &data, options).map_err(|errors| {
            DataAccessError::bad_request(
                format!("invalid {} update", model.name),
                ValidationErrors::Entry(errors),
            )
        })?;

        let encoded = self.mutator.mutate_for_write(model, data).await?;
        let updated = self
            .store
            .update(scope, id, encoded)
            .await?
            .ok_or_else(|| Self::not_found(scope, id))?;
        if let Some(cache) = self.cache_for(scope) {
            cache.set(scope, &updated).await?;
        }
        self.decode(scope, updated).await
    }

    /// Updates entries by their own identifiers; returns those that exist.
    pub async fn batch_update(&self, scope: &ModelScope, data: Vec<Entry>) -> AccessResult<Vec<Entry>> {
        let model = scope.model();
        let options = ValidationOptions::update(scope.restrictions_relaxed());
        validate_entries(model, &data, options).map_err(|errors| {
            DataAccessError::bad_request(
                format!("invalid {} updates", model.name),
                ValidationErrors::Batch(errors),
            )
        })?;

        let encoded = self.mutator.mutate_many_for_write(model, data).await?;
        let updated = self.store.batch_update(scope, encoded).await?;
        if let Some(cache) = self.cache_for(scope) {
            cache.set_multiple(scope, &updated).await?;
        }
        self.decode_many(scope, updated).await
    }

    pub async fn delete(&self, scope: &ModelScope, id: &str) -> AccessResult<()> {
        if let Some(cache) = self.cache_for(scope) {
            cache.delete(scope, id).await?;
        }
        Ok(self.store.delete(scope, id).await?)
    }

    pub async fn batch_delete(&self, scope: &ModelScope, ids: &[String]) -> AccessResult<()> {
        if let Some(cache) = self.cache_for(scope) {
            cache.delete_multiple(scope, ids).await?;
        }
        Ok(self.store.batch_delete(scope, ids).await?)
    }

    // ── Locks and counters ───────────────────────────────────────

    /// Acquires `name`, trying `retries` more times after a failure. The
    /// last failure is returned once retries run out.
    pub async fn lock(&self, name: &str, ttl: Option<Duration>, retries: u32) -> AccessResult<Lock> {
        let cache = self.require_cache()?;
        let mut remaining = retries;
        loop {
            match cache.lock(name, ttl).await {
                Ok(lock) => return Ok(lock),
                Err(err) if remaining > 0 => {
                    remaining -= 1;
                    warn!(name, remaining, error = %err, "lock attempt failed, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn unlock(&self, lock: &Lock) -> AccessResult<()> {
        Ok(self.require_cache()?.unlock(lock).await?)
    }

    pub fn incrementer(&self, name: &str, ttl: Option<Duration>) -> AccessResult<Incrementer> {
        let cache = self.require_cache()?;
        Ok(Incrementer::new(Arc::clone(cache), name, ttl))
    }

    pub fn limiter(&self, name: &str, max: i64, ttl: Option<Duration>) -> AccessResult<Limiter> {
        let cache = self.require_cache()?;
        Ok(Limiter::new(Arc::clone(cache), name, max, ttl))
    }

    // ── Projection and hashed fields ─────────────────────────────

    /// Rejects projections naming unknown or restricted fields.
    pub fn validate_projection(&self, scope: &ModelScope, fields: &[String]) -> AccessResult<()> {
        let model = scope.model();
        if model.is_valid_projection(fields) {
            return Ok(());
        }
        let rejected: Vec<&str> = fields
            .iter()
            .map(String::as_str)
            .filter(|field| !model.is_valid_projection(&[*field]))
            .collect();
        Err(DataAccessError::AccessDenied(format!(
            "fields [{}] of {} cannot be projected",
            rejected.join(", "),
            model.name
        )))
    }

    /// Keeps only `fields` of `entry`; an empty list means the model's
    /// default projection.
    pub fn project(&self, scope: &ModelScope, mut entry: Entry, fields: &[String]) -> AccessResult<Entry> {
        let projection = if fields.is_empty() {
            scope.model().default_projection()
        } else {
            self.validate_projection(scope, fields)?;
            fields.to_vec()
        };
        let keep = |field: &str| projection.iter().any(|f| f == field);
        if !keep(ID_FIELD) && !keep("id") {
            entry.id = None;
        }
        if !keep(OWNER_FIELD) {
            entry.owner = None;
        }
        entry.fields.retain(|field, _| keep(field));
        Ok(entry)
    }

    /// Whether `plaintext` matches the stored hash of `field` on entry `id`.
    /// An entry without a value for the field never matches.
    pub async fn verify_hashed(
        &self,
        scope: &ModelScope,
        id: &str,
        field: &str,
        plaintext: &str,
    ) -> AccessResult<bool> {
        if !scope.model().descriptor(field).is_some_and(|d| d.hashed) {
            return Err(DataAccessError::Configuration(format!(
                "{}.{field} is not a hashed field",
                scope.model().name
            )));
        }
        let entry = self.get(scope, id).await?;
        let Some(hash) = entry.get_str(field).filter(|h| !h.is_empty()) else {
            return Ok(false);
        };
        let hasher = &self.mutator.crypto().hasher;
        Ok(hasher.verify(plaintext.to_string(), hash.to_string()).await?)
    }
}

impl std::fmt::Debug for DataAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAccess")
            .field("cached", &self.cache.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

