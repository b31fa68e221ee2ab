//! Cache store abstraction and its key-value implementation.

use crate::error::{CacheError, CacheResult};
use crate::lock::{Lock, Redlock, RedlockConfig};
use crate::node::{KvNode, MemoryNode};
use async_trait::async_trait;
use cerberus_model::ModelScope;
use cerberus_types::{Entry, EntryId};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the orchestrator gets a cache at all.
    pub enabled: bool,
    /// Prefix of every key.
    pub namespace: String,
    /// Lifetime of cached entries, in seconds.
    pub expiration_secs: u64,
    /// In-process nodes backing the cache and the lock quorum.
    pub nodes: usize,
    pub redlock: RedlockConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: "cerberus".to_string(),
            expiration_secs: 3600,
            nodes: 1,
            redlock: RedlockConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

/// Cache-aside storage of entries plus locks and counters.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// A cached entry, or `None` on a miss. Entries owned by someone other
    /// than the scope's owner are misses unless the scope skips ownership.
    async fn get(&self, scope: &ModelScope, id: &str) -> CacheResult<Option<Entry>>;

    async fn set(&self, scope: &ModelScope, entry: &Entry) -> CacheResult<()>;

    async fn set_multiple(&self, scope: &ModelScope, entries: &[Entry]) -> CacheResult<()>;

    async fn delete(&self, scope: &ModelScope, id: &str) -> CacheResult<()>;

    async fn delete_multiple(&self, scope: &ModelScope, ids: &[String]) -> CacheResult<()>;

    async fn lock(&self, name: &str, ttl: Option<Duration>) -> CacheResult<Lock>;

    async fn unlock(&self, lock: &Lock) -> CacheResult<()>;

    /// Adds `value` to a counter; a given ttl is (re)applied.
    async fn incr(&self, name: &str, value: i64, ttl: Option<Duration>) -> CacheResult<i64>;

    async fn get_incr(&self, name: &str) -> CacheResult<Option<i64>>;

    async fn get_incr_ttl(&self, name: &str) -> CacheResult<Option<Duration>>;
}

/// [`CacheStore`] over key-value nodes: entries and counters on the first
/// node, locks on the majority of all nodes.
#[derive(Debug)]
pub struct KvCache {
    config: CacheConfig,
    primary: Arc<dyn KvNode>,
    redlock: Redlock,
}

impl KvCache {
    pub fn new(config: CacheConfig, nodes: Vec<Arc<dyn KvNode>>) -> CacheResult<Self> {
        let primary = nodes.first().cloned().ok_or(CacheError::NoNodes)?;
        let redlock = Redlock::new(nodes, config.redlock.clone());
        Ok(Self {
            config,
            primary,
            redlock,
        })
    }

    /// A cache over `config.nodes` fresh in-process nodes.
    pub fn in_memory(config: CacheConfig) -> Self {
        let nodes: Vec<Arc<dyn KvNode>> = (0..config.nodes.max(1))
            .map(|i| Arc::new(MemoryNode::new(format!("memory-{i}"))) as Arc<dyn KvNode>)
            .collect();
        let primary = Arc::clone(&nodes[0]);
        let redlock = Redlock::new(nodes, config.redlock.clone());
        Self {
            config,
            primary,
            redlock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn redlock(&self) -> &Redlock {
        &self.redlock
    }

    /// `{ns}:cache:{model namespace}:{id}`, with canonical ids.
    pub fn entry_key(&self, scope: &ModelScope, id: &str) -> String {
        let id = EntryId::parse(id).map_or_else(|_| id.to_string(), |id| id.to_string());
        format!(
            "{}:cache:{}:{}",
            self.config.namespace,
            scope.model().namespace,
            id
        )
    }

    pub fn incr_key(&self, name: &str) -> String {
        format!("{}:incr:{name}", self.config.namespace)
    }

    pub fn lock_key(&self, name: &str) -> String {
        format!("{}:locks:{name}", self.config.namespace)
    }

    fn key_for(&self, scope: &ModelScope, entry: &Entry) -> CacheResult<String> {
        let id = entry.id.ok_or(CacheError::MissingIdentifier)?;
        Ok(self.entry_key(scope, &id.to_string()))
    }
}

#[async_trait]
impl CacheStore for KvCache {
    async fn get(&self, scope: &ModelScope, id: &str) -> CacheResult<Option<Entry>> {
        let key = self.entry_key(scope, id);
        let Some(raw) = self.primary.get(&key).await? else {
            debug!(%key, "cache miss");
            return Ok(None);
        };
        let entry: Entry = serde_json::from_str(&raw)?;
        if !scope.is_skipping_ownership() && entry.owner != scope.owner() {
            debug!(%key, "cached entry has another owner, treating as miss");
            return Ok(None);
        }
        debug!(%key, "cache hit");
        Ok(Some(entry))
    }

    async fn set(&self, scope: &ModelScope, entry: &Entry) -> CacheResult<()> {
        let key = self.key_for(scope, entry)?;
        let raw = serde_json::to_string(entry)?;
        self.primary.set_ex(&key, raw, self.config.expiration()).await
    }

    async fn set_multiple(&self, scope: &ModelScope, entries: &[Entry]) -> CacheResult<()> {
        try_join_all(entries.iter().map(|entry| self.set(scope, entry))).await?;
        Ok(())
    }

    async fn delete(&self, scope: &ModelScope, id: &str) -> CacheResult<()> {
        self.primary.del(&[self.entry_key(scope, id)]).await?;
        Ok(())
    }

    async fn delete_multiple(&self, scope: &ModelScope, ids: &[String]) -> CacheResult<()> {
        let keys: Vec<String> = ids.iter().map(|id| self.entry_key(scope, id)).collect();
        self.primary.del(&keys).await?;
        Ok(())
    }

    async fn lock(&self, name: &str, ttl: Option<Duration>) -> CacheResult<Lock> {
        self.redlock.lock(&self.lock_key(name), ttl).await
    }

    async fn unlock(&self, lock: &Lock) -> CacheResult<()> {
        self.redlock.unlock(lock).await;
        Ok(())
    }

    async fn incr(&self, name: &str, value: i64, ttl: Option<Duration>) -> CacheResult<i64> {
        let key = self.incr_key(name);
        let current = self.primary.incr_by(&key, value).await?;
        if let Some(ttl) = ttl {
            self.primary.expire(&key, ttl).await?;
        }
        Ok(current)
    }

    async fn get_incr(&self, name: &str) -> CacheResult<Option<i64>> {
        let key = self.incr_key(name);
        match self.primary.get(&key).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| CacheError::NotAnInteger(key)),
            None => Ok(None),
        }
    }

    async fn get_incr_ttl(&self, name: &str) -> CacheResult<Option<Duration>> {
        self.primary.ttl(&self.incr_key(name)).await
    }
}
