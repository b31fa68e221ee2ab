//! One key-value cache node.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// The key-value primitives the cache and the lock are built on.
#[async_trait]
pub trait KvNode: Send + Sync {
    /// Identifies the node in logs and errors.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Sets `key` with an expiration, replacing any previous one.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Removes keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> CacheResult<usize>;

    /// Atomically adds `delta`, treating a missing key as zero. The key's
    /// expiration is kept.
    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Sets an expiration on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Time left before `key` expires; `None` when missing or persistent.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Sets `key` only if absent.
    async fn set_nx_px(&self, key: &str, value: String, ttl: Duration) -> CacheResult<bool>;

    /// Deletes `key` only if it holds `value`.
    async fn del_if_eq(&self, key: &str, value: &str) -> CacheResult<bool>;
}

impl std::fmt::Debug for dyn KvNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KvNode").field(&self.name()).finish()
    }
}

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process node. Expired keys are dropped lazily when touched.
///
/// Time comes from `tokio::time`, so a paused test clock drives expiry.
pub struct MemoryNode {
    name: String,
    slots: Mutex<HashMap<String, Slot>>,
    online: AtomicBool,
}

impl MemoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulates an outage: an offline node fails every call.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unavailable(&self) -> CacheError {
        CacheError::NodeUnavailable {
            node: self.name.clone(),
        }
    }

    /// Drops every expired key, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let Ok(mut slots) = self.slots.lock() else {
            return 0;
        };
        let before = slots.len();
        slots.retain(|_, slot| slot.is_live(now));
        before - slots.len()
    }

    /// Runs `f` over the slots once `key` is evicted if it has expired.
    fn with_key<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Slot>, Instant) -> T) -> CacheResult<T> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(self.unavailable());
        }
        let now = Instant::now();
        let mut slots = self.slots.lock().map_err(|_| self.unavailable())?;
        if slots.get(key).is_some_and(|slot| !slot.is_live(now)) {
            slots.remove(key);
        }
        Ok(f(&mut slots, now))
    }
}

impl std::fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNode")
            .field("name", &self.name)
            .field("online", &self.online.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KvNode for MemoryNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.with_key(key, |slots, _| slots.get(key).map(|s| s.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.with_key(key, |slots, now| {
            slots.insert(
                key.to_string(),
                Slot {
                    value,
                    expires_at: Some(now + ttl),
                },
            );
        })
    }

    async fn del(&self, keys: &[String]) -> CacheResult<usize> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(self.unavailable());
        }
        let now = Instant::now();
        let mut slots = self.slots.lock().map_err(|_| self.unavailable())?;
        Ok(keys
            .iter()
            .filter(|k| slots.remove(k.as_str()).is_some_and(|slot| slot.is_live(now)))
            .count())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.with_key(key, |slots, _| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: "0".to_string(),
                expires_at: None,
            });
            let current: i64 = slot
                .value
                .parse()
                .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
            let next = current
                .checked_add(delta)
                .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
            slot.value = next.to_string();
            Ok(next)
        })?
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.with_key(key, |slots, now| match slots.get_mut(key) {
            Some(slot) => {
                slot.expires_at = Some(now + ttl);
                true
            }
            None => false,
        })
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.with_key(key, |slots, now| {
            slots
                .get(key)
                .and_then(|slot| slot.expires_at)
                .map(|at| at.saturating_duration_since(now))
        })
    }

    async fn set_nx_px(&self, key: &str, value: String, ttl: Duration) -> CacheResult<bool> {
        self.with_key(key, |slots, now| {
            if slots.contains_key(key) {
                return false;
            }
            slots.insert(
                key.to_string(),
                Slot {
                    value,
                    expires_at: Some(now + ttl),
                },
            );
            true
        })
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> CacheResult<bool> {
        self.with_key(key, |slots, _| {
            if slots.get(key).is_some_and(|slot| slot.value == value) {
                slots.remove(key);
                true
            } else {
                false
            }
        })
    }
}
