//! Redis store tests
//!
//! These need a running server and are ignored by default:
//!
//! ```text
//! TIERCACHE_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -p tiercache-storage -- --ignored
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tiercache_storage::{CacheError, CacheStore, CacheStoreExt, RedisStore, TieredStore};
use tiercache_test_utils::{assertions, fixtures, init_test_tracing, Account, Profile};
use uuid::Uuid;

fn connect() -> RedisStore {
    init_test_tracing();
    let url = std::env::var("TIERCACHE_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisStore::connect(&url).expect("redis should be reachable")
}

fn unique_key(label: &str) -> String {
    format!("tiercache-test:{}:{}", label, Uuid::now_v7())
}

#[test]
#[ignore = "requires a running Redis server"]
fn test_redis_basic_operations() {
    let store = connect();
    let key = unique_key("basic");

    assert_eq!(store.try_get::<String>(&key).expect("get should succeed"), None);
    assert!(store.create(&key, &fixtures::profile(), Duration::from_secs(30)).expect("create should succeed"));
    assert!(!store.create(&key, &Profile::default(), Duration::from_secs(30)).expect("create should succeed"));
    assert_eq!(
        store.try_get::<Profile>(&key).expect("get should succeed"),
        Some(fixtures::profile())
    );
    assert!(store.remove(&key).expect("remove should succeed"));
    assert!(!store.remove(&key).expect("remove should succeed"));
}

#[test]
#[ignore = "requires a running Redis server"]
fn test_redis_records_and_ttl() {
    let store = connect();
    let key = unique_key("account");
    let account = fixtures::account();

    store.set(&key, &account, Duration::from_millis(200)).expect("set should succeed");
    assert_eq!(store.try_get::<Account>(&key).expect("get should succeed"), Some(account));
    thread::sleep(Duration::from_millis(400));
    assert_eq!(store.try_get::<Account>(&key).expect("get should succeed"), None);
}

#[test]
#[ignore = "requires a running Redis server"]
fn test_redis_increments() {
    let store = Arc::new(connect());
    let key = unique_key("counter");

    assertions::assert_not_found(&store.increment(&key));
    assert_eq!(store.increment_or_create(&key, 5, Duration::from_secs(30)).expect("should succeed"), 5);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            thread::spawn(move || {
                (0..10)
                    .filter(|_| match store.increment(&key) {
                        Ok(_) => true,
                        Err(e) if e.is_conflict_exhausted() => false,
                        Err(e) => panic!("unexpected increment error: {}", e),
                    })
                    .count() as i64
            })
        })
        .collect();
    let successes: i64 = handles
        .into_iter()
        .map(|h| h.join().expect("thread should not panic"))
        .sum();

    assert_eq!(store.must_try_get::<i64>(&key), Some(5 + successes));
    store.remove(&key).expect("remove should succeed");
}

#[test]
#[ignore = "requires a running Redis server"]
fn test_redis_as_slow_tier() {
    let tiers = fixtures::memory_tiers(Duration::from_secs(60));
    let slow = Arc::new(connect());
    let tiered = TieredStore::new(tiers.fast.clone(), slow.clone(), Arc::new(Default::default()))
        .expect("tiered store should succeed");
    let key = unique_key("tiered");

    tiered.set(&key, &42i64, Duration::from_secs(30)).expect("set should succeed");
    tiers.fast.clear();
    assert_eq!(tiered.try_get::<i64>(&key).expect("get should succeed"), Some(42));
    assert_eq!(tiers.fast.len(), 1);
    assert!(matches!(
        tiered.increment(&key),
        Err(CacheError::UnsupportedOperation { .. })
    ));
    slow.remove(&key).expect("remove should succeed");
}
