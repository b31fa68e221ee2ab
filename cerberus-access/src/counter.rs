//! Named counters kept in the cache store.

use crate::error::AccessResult;
use cerberus_cache::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One named, optionally expiring counter.
#[derive(Clone)]
pub struct Incrementer {
    cache: Arc<dyn CacheStore>,
    name: String,
    ttl: Option<Duration>,
}

impl Incrementer {
    /// A zero `ttl` means the counter never expires.
    pub fn new(cache: Arc<dyn CacheStore>, name: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            cache,
            name: name.into(),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Adds `step` and returns the new value. The ttl is re-applied on
    /// every call.
    pub async fn incr(&self, step: i64) -> AccessResult<i64> {
        Ok(self.cache.incr(&self.name, step, self.ttl).await?)
    }

    /// Current value, `0` when the counter does not exist.
    pub async fn get_value(&self) -> AccessResult<i64> {
        Ok(self.cache.get_incr(&self.name).await?.unwrap_or(0))
    }

    /// Time left before the counter expires.
    pub async fn get_ttl(&self) -> AccessResult<Option<Duration>> {
        Ok(self.cache.get_incr_ttl(&self.name).await?)
    }
}

impl std::fmt::Debug for Incrementer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Incrementer")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// A counter with an upper bound.
///
/// The pre-check and the increment are separate calls, so concurrent callers
/// may push the stored value past `max`. Acceptance is decided on the value
/// the atomic increment returns, so no more than `max` increments are ever
/// accepted within one window.
#[derive(Debug, Clone)]
pub struct Limiter {
    counter: Incrementer,
    max: i64,
}

impl Limiter {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        name: impl Into<String>,
        max: i64,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            counter: Incrementer::new(cache, name, ttl),
            max,
        }
    }

    pub fn name(&self) -> &str {
        self.counter.name()
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Counts one more use. Returns `false` once the limit is reached.
    pub async fn incr(&self) -> AccessResult<bool> {
        self.incr_by(1).await
    }

    /// Counts `step` uses. The window starts with the first increment; later
    /// increments leave its expiry alone.
    pub async fn incr_by(&self, step: i64) -> AccessResult<bool> {
        let existing = self.counter.get_value().await?;
        if existing > self.max {
            debug!(name = self.name(), existing, max = self.max, "limit already exceeded");
            return Ok(false);
        }
        let ttl = if existing == 0 { self.counter.ttl() } else { None };
        let value = self
            .counter
            .cache
            .incr(self.counter.name(), step, ttl)
            .await?;
        let allowed = value <= self.max;
        if !allowed {
            debug!(name = self.name(), value, max = self.max, "limit reached");
        }
        Ok(allowed)
    }

    pub async fn get_value(&self) -> AccessResult<i64> {
        self.counter.get_value().await
    }

    pub async fn get_ttl(&self) -> AccessResult<Option<Duration>> {
        self.counter.get_ttl().await
    }

    /// Uses left in the current window, never negative.
    pub async fn get_remaining(&self) -> AccessResult<i64> {
        let value = self.counter.get_value().await?;
        Ok((self.max - value).max(0))
    }
}
