//! Redlock: a lock held by a majority of independent nodes.

use crate::error::{CacheError, CacheResult};
use crate::node::KvNode;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lock acquisition tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedlockConfig {
    /// Fraction of the ttl reserved for clock drift between nodes.
    pub drift_factor: f64,
    /// Acquisition rounds before giving up.
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    /// Random spread added to or removed from each retry delay.
    pub retry_jitter_ms: u64,
    /// Ttl used when the caller gives none.
    pub default_ttl_ms: u64,
}

impl Default for RedlockConfig {
    fn default() -> Self {
        Self {
            drift_factor: 0.01,
            retry_count: 10,
            retry_delay_ms: 100,
            retry_jitter_ms: 50,
            default_ttl_ms: 1000,
        }
    }
}

/// Handle for an acquired lock. Releasing it is explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    resource: String,
    token: String,
    expires_at: Instant,
    attempts: u32,
}

impl Lock {
    /// The lock key on every node.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Random value identifying this holder.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Conservative end of validity, drift already subtracted.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Rounds it took to acquire.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Majority lock over a set of nodes.
pub struct Redlock {
    nodes: Vec<Arc<dyn KvNode>>,
    config: RedlockConfig,
}

impl Redlock {
    pub fn new(nodes: Vec<Arc<dyn KvNode>>, config: RedlockConfig) -> Self {
        Self { nodes, config }
    }

    pub fn config(&self) -> &RedlockConfig {
        &self.config
    }

    /// Votes needed to hold a lock.
    pub fn quorum(&self) -> usize {
        self.nodes.len() / 2 + 1
    }

    pub async fn lock(&self, resource: &str, ttl: Option<Duration>) -> CacheResult<Lock> {
        let ttl = ttl.unwrap_or(Duration::from_millis(self.config.default_ttl_ms));
        let token = format!("{:032x}", rand::random::<u128>());
        let drift = ttl.mul_f64(self.config.drift_factor) + Duration::from_millis(2);
        let rounds = self.config.retry_count.max(1);

        for attempt in 1..=rounds {
            let started = Instant::now();
            let votes = join_all(
                self.nodes
                    .iter()
                    .map(|node| node.set_nx_px(resource, token.clone(), ttl)),
            )
            .await
            .into_iter()
            .filter(|vote| matches!(vote, Ok(true)))
            .count();

            let validity = ttl.checked_sub(started.elapsed() + drift);
            if votes >= self.quorum()
                && let Some(validity) = validity
                && !validity.is_zero()
            {
                debug!(resource, attempt, votes, "lock acquired");
                return Ok(Lock {
                    resource: resource.to_string(),
                    token,
                    expires_at: started + (ttl - drift),
                    attempts: attempt,
                });
            }

            self.release(resource, &token).await;
            if attempt < rounds {
                debug!(resource, attempt, votes, quorum = self.quorum(), "lock busy, retrying");
                tokio::time::sleep(self.retry_delay()).await;
            }
        }

        warn!(resource, attempts = rounds, "lock unavailable");
        Err(CacheError::LockUnavailable {
            resource: resource.to_string(),
            attempts: rounds,
        })
    }

    /// Releases `lock` on every node still holding its token.
    pub async fn unlock(&self, lock: &Lock) {
        self.release(&lock.resource, &lock.token).await;
        debug!(resource = %lock.resource, "lock released");
    }

    async fn release(&self, resource: &str, token: &str) {
        let results = join_all(
            self.nodes
                .iter()
                .map(|node| node.del_if_eq(resource, token)),
        )
        .await;
        for (node, result) in self.nodes.iter().zip(results) {
            if let Err(e) = result {
                debug!(node = node.name(), resource, error = %e, "release skipped");
            }
        }
    }

    fn retry_delay(&self) -> Duration {
        let base = self.config.retry_delay_ms as i64;
        let jitter = self.config.retry_jitter_ms as i64;
        let spread = if jitter > 0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0
        };
        Duration::from_millis((base + spread).max(0) as u64)
    }
}

impl std::fmt::Debug for Redlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redlock")
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .finish()
    }
}
