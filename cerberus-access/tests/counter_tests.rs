use cerberus_access::{AccessConfig, DataAccess, DataAccessError, Limiter};
use cerberus_cache::{CacheConfig, CacheError, KvCache};
use cerberus_crypto::{CipherKey, FieldCrypto, HashParams};
use cerberus_storage::SqliteStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn bare() -> DataAccess {
    let crypto = FieldCrypto::new(CipherKey::generate(), HashParams::insecure_fast());
    DataAccess::new(
        Arc::new(SqliteStore::open_in_memory()),
        Arc::new(crypto),
        AccessConfig::default(),
    )
}

fn access() -> DataAccess {
    bare().with_cache(Arc::new(KvCache::in_memory(CacheConfig {
        enabled: true,
        namespace: "test".into(),
        ..CacheConfig::default()
    })))
}

fn secs(n: u64) -> Option<Duration> {
    Some(Duration::from_secs(n))
}

// ── Limiter ──────────────────────────────────────────────────────

#[tokio::test]
async fn limiter_allows_exactly_max() {
    let access = access();
    let limiter = access.limiter("limit:p1:follow", 3, secs(60)).unwrap();

    let mut results = Vec::new();
    for _ in 0..4 {
        results.push(limiter.incr().await.unwrap());
    }
    assert_eq!(results, vec![true, true, true, false]);
    assert_eq!(limiter.get_remaining().await.unwrap(), 0);

    let ttl = limiter.get_ttl().await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60));
}

#[tokio::test]
async fn daily_likes_limit() {
    let access = access();
    let limiter = access.limiter("limit:p1:likes", 70, secs(86_400)).unwrap();

    for call in 0..70 {
        assert!(limiter.incr().await.unwrap(), "call {call} should pass");
    }
    assert_eq!(limiter.get_remaining().await.unwrap(), 0);
    assert!(!limiter.incr().await.unwrap());
    assert_eq!(limiter.get_remaining().await.unwrap(), 0);
}

#[tokio::test]
async fn refused_calls_stop_counting_once_over_the_limit() {
    let access = access();
    let limiter = access.limiter("limit:burst", 2, secs(60)).unwrap();

    for _ in 0..10 {
        limiter.incr().await.unwrap();
    }
    // The third call pushes the value past the cap; later ones are refused
    // by the pre-check without incrementing.
    assert_eq!(limiter.get_value().await.unwrap(), 3);
}

#[tokio::test]
async fn remaining_counts_down() {
    let access = access();
    let limiter = access.limiter("limit:count", 5, None).unwrap();

    assert_eq!(limiter.get_remaining().await.unwrap(), 5);
    limiter.incr_by(2).await.unwrap();
    assert_eq!(limiter.get_remaining().await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn limiter_window_resets_after_ttl() {
    let access = access();
    let limiter = access.limiter("limit:window", 1, secs(10)).unwrap();

    assert!(limiter.incr().await.unwrap());
    assert!(!limiter.incr().await.unwrap());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(limiter.get_value().await.unwrap(), 0);
    assert!(limiter.incr().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn limiter_ttl_is_set_once_per_window() {
    let access = access();
    let limiter = access.limiter("limit:fixed", 5, secs(10)).unwrap();

    limiter.incr().await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    limiter.incr().await.unwrap();

    let ttl = limiter.get_ttl().await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(4), "window was extended to {ttl:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_exceed_the_cap() {
    let access = access();
    let limiter: Limiter = access.limiter("limit:race", 5, secs(60)).unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.incr().await.unwrap() })
        })
        .collect();
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 5);
    assert!(limiter.get_value().await.unwrap() >= 6);
    assert_eq!(limiter.get_remaining().await.unwrap(), 0);
}

// ── Incrementer ──────────────────────────────────────────────────

#[tokio::test]
async fn incrementer_steps() {
    let access = access();
    let counter = access.incrementer("visits", None).unwrap();

    assert_eq!(counter.get_value().await.unwrap(), 0);
    assert_eq!(counter.incr(5).await.unwrap(), 5);
    assert_eq!(counter.incr(-2).await.unwrap(), 3);
    assert_eq!(counter.get_value().await.unwrap(), 3);
    assert_eq!(counter.ttl(), None);
}

#[tokio::test]
async fn zero_ttl_means_no_expiry() {
    let access = access();
    let counter = access.incrementer("forever", Some(Duration::ZERO)).unwrap();
    assert_eq!(counter.ttl(), None);
}

#[tokio::test(start_paused = true)]
async fn incrementer_reapplies_ttl() {
    let access = access();
    let counter = access.incrementer("sliding", secs(10)).unwrap();

    counter.incr(1).await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    counter.incr(1).await.unwrap();

    let ttl = counter.get_ttl().await.unwrap().unwrap();
    assert!(ttl > Duration::from_secs(4), "ttl was not refreshed: {ttl:?}");

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(counter.get_value().await.unwrap(), 0);
}

#[tokio::test]
async fn limiter_and_incrementer_share_names() {
    let access = access();
    let counter = access.incrementer("shared", None).unwrap();
    let limiter = access.limiter("shared", 10, None).unwrap();

    counter.incr(4).await.unwrap();
    assert_eq!(limiter.get_remaining().await.unwrap(), 6);
}

// ── Locks ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn held_lock_blocks_until_released() {
    let access = access();
    let held = access.lock("job", secs(60), 0).await.unwrap();
    assert_eq!(held.attempts(), 1);

    let err = access.lock("job", None, 2).await.unwrap_err();
    assert!(matches!(
        err,
        DataAccessError::Cache(CacheError::LockUnavailable { .. })
    ));
    assert_eq!(err.status_code(), 500);

    access.unlock(&held).await.unwrap();
    let again = access.lock("job", None, 0).await.unwrap();
    assert_eq!(again.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_lock_can_be_taken() {
    let access = access();
    let _held = access.lock("report", Some(Duration::from_millis(300)), 0).await.unwrap();

    let lock = access.lock("report", None, 0).await.unwrap();
    assert!(lock.attempts() > 1);
}

#[tokio::test(start_paused = true)]
async fn different_names_do_not_contend() {
    let access = access();
    let a = access.lock("a", secs(60), 0).await.unwrap();
    let b = access.lock("b", secs(60), 0).await.unwrap();
    assert_ne!(a.token(), b.token());
}

// ── Without a cache ──────────────────────────────────────────────

#[tokio::test]
async fn locks_and_counters_need_a_cache() {
    let access = bare();

    let err = access.lock("job", None, 3).await.unwrap_err();
    assert!(matches!(err, DataAccessError::Configuration(_)));
    assert!(matches!(
        access.incrementer("visits", None),
        Err(DataAccessError::Configuration(_))
    ));
    assert!(matches!(
        access.limiter("limit", 1, None),
        Err(DataAccessError::Configuration(_))
    ));

    let other = access_with_lock().await;
    let err = access.unlock(&other).await.unwrap_err();
    assert!(matches!(err, DataAccessError::Configuration(_)));
}

async fn access_with_lock() -> cerberus_cache::Lock {
    access().lock("elsewhere", secs(1), 0).await.unwrap()
}
