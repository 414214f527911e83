//! In-process expiring store.
//!
//! Entries live in a `RwLock<HashMap>` and expire lazily on access. A
//! background sweeper can be attached to drop expired entries that are never
//! read again.
//!
//! # Increment
//!
//! `increment` is optimistic: it reads the value together with the entry's
//! version token outside the write lock, then commits only if the version is
//! unchanged. A lost race is retried up to the configured budget, after which
//! the call fails with [`CacheError::ConflictExhausted`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tiercache_core::{CacheError, CacheResult, CoerceError, Converter, Shape, Value};
use tracing::{debug, warn};

use super::traits::{CacheStats, CacheStore};

/// Default optimistic retry budget for `increment`.
pub const DEFAULT_MAX_INCREMENT_RETRIES: u32 = 3;

const STORE_NAME: &str = "memory";

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expire_at: Option<Instant>,
    version: u64,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expire_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    conflicts: AtomicU64,
}

/// In-process [`CacheStore`].
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    converter: Converter,
    max_increment_retries: u32,
    next_version: AtomicU64,
    counters: Counters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            converter: Converter::default(),
            max_increment_retries: DEFAULT_MAX_INCREMENT_RETRIES,
            next_version: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// Use `converter` to reshape stored values on read.
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    /// Set the optimistic retry budget for `increment` (at least one attempt).
    pub fn with_max_increment_retries(mut self, retries: u32) -> Self {
        self.max_increment_retries = retries.max(1);
        self
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        self.counters
            .expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` on a
    /// background thread.
    ///
    /// The thread holds only a weak reference to the store and stops when the
    /// returned handle is dropped or the store is gone.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> CacheResult<SweeperHandle> {
        let store: Weak<Self> = Arc::downgrade(self);
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("tiercache-sweeper".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(live) = store.upgrade() else { break };
                        let removed = live.sweep_expired();
                        if removed > 0 {
                            debug!(removed, "swept expired cache entries");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| {
                warn!(error = %e, "failed to spawn cache sweeper");
                CacheError::backend(STORE_NAME, e)
            })?;

        Ok(SweeperHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn entry(&self, value: &Value, ttl: Duration) -> Entry {
        Entry {
            value: value.clone(),
            expire_at: if ttl.is_zero() {
                None
            } else {
                Instant::now().checked_add(ttl)
            },
            version: self.version(),
        }
    }

    fn integer(&self, key: &str, value: &Value) -> CacheResult<i64> {
        let coerced = self
            .converter
            .coerce(value.clone(), &Shape::Int { bits: 64 })
            .map_err(|e| e.at_key(key))?;
        coerced.as_i64().ok_or_else(|| {
            CoerceError::Unsupported {
                from: coerced.describe(),
                to: "i64".to_string(),
            }
            .at_key(key)
            .into()
        })
    }

    /// Drop `key` if it is still present and expired.
    fn expire(&self, key: &str) {
        let now = Instant::now();
        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn overflow(key: &str, current: i64, delta: i64) -> CacheError {
    CoerceError::Parse {
        input: format!("{} + {}", current, delta),
        target: "i64".to_string(),
        reason: "increment overflows".to_string(),
    }
    .at_key(key)
    .into()
}

impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    fn try_get_value(&self, key: &str, shape: &Shape) -> CacheResult<Option<Value>> {
        let now = Instant::now();
        let lookup = self
            .read()
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        let found = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.expire(key);
                None
            }
            None => None,
        };

        match found {
            Some(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(self.converter.coerce(value, shape)?))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn create_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(key.to_string(), self.entry(value, ttl));
        Ok(true)
    }

    fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        let entry = self.entry(value, ttl);
        self.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .write()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    fn increment(&self, key: &str) -> CacheResult<i64> {
        for attempt in 1..=self.max_increment_retries {
            let now = Instant::now();
            let (current, version) = match self.read().get(key) {
                Some(entry) if entry.is_live(now) => (entry.value.clone(), entry.version),
                _ => {
                    return Err(CacheError::NotFound {
                        key: key.to_string(),
                    })
                }
            };
            let current = self.integer(key, &current)?;
            let next = current.checked_add(1).ok_or_else(|| overflow(key, current, 1))?;

            let mut entries = self.write();
            match entries.get_mut(key) {
                Some(entry) if entry.version == version && entry.is_live(Instant::now()) => {
                    entry.value = Value::Int(next);
                    entry.version = self.version();
                    return Ok(next);
                }
                _ => {
                    self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, attempt, "increment lost a race, retrying");
                }
            }
        }

        Err(CacheError::ConflictExhausted {
            key: key.to_string(),
            attempts: self.max_increment_retries,
        })
    }

    fn increment_or_create(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        let now = Instant::now();
        let mut entries = self.write();
        let existing = match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(self.integer(key, &entry.value)?),
            _ => None,
        };

        match existing {
            Some(current) => {
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| overflow(key, current, delta))?;
                let version = self.version();
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = Value::Int(next);
                    entry.version = version;
                }
                Ok(next)
            }
            None => {
                entries.insert(key.to_string(), self.entry(&Value::Int(delta), ttl));
                Ok(delta)
            }
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            expired: self.counters.expired.load(Ordering::Relaxed),
            conflicts: self.counters.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Stops the background sweeper when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("cache sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::{CacheStoreExt, NO_EXPIRATION};

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new();
        store
            .set("k", &42i32, NO_EXPIRATION)
            .expect("set should succeed");
        let mut out = 0i64;
        store.get("k", &mut out).expect("get should succeed");
        assert_eq!(out, 42);
    }

    #[test]
    fn test_get_absent_leaves_output_unchanged() {
        let store = MemoryStore::new();
        let mut out = "untouched".to_string();
        store.get("missing", &mut out).expect("get should succeed");
        assert_eq!(out, "untouched");
        assert_eq!(store.try_get::<String>("missing"), Ok(None));
    }

    #[test]
    fn test_get_reshapes_stored_value() {
        let store = MemoryStore::new();
        store
            .set("k", &"1~2~3".to_string(), NO_EXPIRATION)
            .expect("set should succeed");
        let parts: Option<Vec<u8>> = store.try_get("k").expect("get should succeed");
        assert_eq!(parts, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_get_coercion_failure_is_error() {
        let store = MemoryStore::new();
        store
            .set("k", &"abc".to_string(), NO_EXPIRATION)
            .expect("set should succeed");
        let err = store.try_get::<i32>("k").expect_err("abc is not a number");
        assert!(matches!(err, CacheError::Coerce(_)));
    }

    #[test]
    fn test_create_only_when_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.create("k", &1i32, NO_EXPIRATION), Ok(true));
        assert_eq!(store.create("k", &2i32, NO_EXPIRATION), Ok(false));
        assert_eq!(store.try_get::<i32>("k"), Ok(Some(1)));
    }

    #[test]
    fn test_remove_reports_deletion() {
        let store = MemoryStore::new();
        store.set("k", &1i32, NO_EXPIRATION).expect("set should succeed");
        assert_eq!(store.remove("k"), Ok(true));
        assert_eq!(store.remove("k"), Ok(false));
    }

    #[test]
    fn test_entries_expire() {
        let store = MemoryStore::new();
        store
            .set("k", &1i32, Duration::from_millis(20))
            .expect("set should succeed");
        assert_eq!(store.try_get::<i32>("k"), Ok(Some(1)));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(store.try_get::<i32>("k"), Ok(None));
        assert!(store.is_empty());
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn test_create_over_expired_entry() {
        let store = MemoryStore::new();
        store
            .set("k", &1i32, Duration::from_millis(10))
            .expect("set should succeed");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.create("k", &2i32, NO_EXPIRATION), Ok(true));
        assert_eq!(store.try_get::<i32>("k"), Ok(Some(2)));
    }

    #[test]
    fn test_increment_absent_is_not_found() {
        let store = MemoryStore::new();
        let err = store.increment("counter").expect_err("absent key should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_increment_existing() {
        let store = MemoryStore::new();
        store.set("counter", &41i64, NO_EXPIRATION).expect("set should succeed");
        assert_eq!(store.increment("counter"), Ok(42));
        assert_eq!(store.try_get::<i64>("counter"), Ok(Some(42)));
    }

    #[test]
    fn test_increment_numeric_string() {
        let store = MemoryStore::new();
        store
            .set("counter", &"9".to_string(), NO_EXPIRATION)
            .expect("set should succeed");
        assert_eq!(store.increment("counter"), Ok(10));
    }

    #[test]
    fn test_increment_non_integer_fails() {
        let store = MemoryStore::new();
        store
            .set("counter", &"nine".to_string(), NO_EXPIRATION)
            .expect("set should succeed");
        assert!(matches!(store.increment("counter"), Err(CacheError::Coerce(_))));
    }

    #[test]
    fn test_increment_overflow_fails() {
        let store = MemoryStore::new();
        store
            .set("counter", &i64::MAX, NO_EXPIRATION)
            .expect("set should succeed");
        assert!(store.increment("counter").is_err());
        assert_eq!(store.try_get::<i64>("counter"), Ok(Some(i64::MAX)));
    }

    #[test]
    fn test_increment_or_create() {
        let store = MemoryStore::new();
        assert_eq!(store.increment_or_create("c", 5, NO_EXPIRATION), Ok(5));
        assert_eq!(store.increment_or_create("c", 5, NO_EXPIRATION), Ok(10));
        assert_eq!(store.increment_or_create("c", -3, NO_EXPIRATION), Ok(7));
    }

    #[test]
    fn test_increment_or_create_ttl_only_on_create() {
        let store = MemoryStore::new();
        store
            .increment_or_create("c", 1, Duration::from_millis(30))
            .expect("create should succeed");
        store
            .increment_or_create("c", 1, NO_EXPIRATION)
            .expect("add should succeed");
        thread::sleep(Duration::from_millis(60));
        assert_eq!(store.try_get::<i64>("c"), Ok(None));
    }

    #[test]
    fn test_sweep_expired() {
        let store = MemoryStore::new();
        store
            .set("short", &1i32, Duration::from_millis(10))
            .expect("set should succeed");
        store.set("long", &1i32, NO_EXPIRATION).expect("set should succeed");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_background_sweeper() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("short", &1i32, Duration::from_millis(10))
            .expect("set should succeed");
        let sweeper = store
            .spawn_sweeper(Duration::from_millis(20))
            .expect("sweeper should spawn");
        thread::sleep(Duration::from_millis(120));
        assert!(store.is_empty());
        sweeper.stop();
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let store = MemoryStore::new();
        store.set("k", &1i32, NO_EXPIRATION).expect("set should succeed");
        let _ = store.try_get::<i32>("k");
        let _ = store.try_get::<i32>("missing");
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .set(&format!("item-{}", i), &i, NO_EXPIRATION)
                .expect("set should succeed");
        }
        assert_eq!(store.len(), 10);
        store.clear();
        assert!(store.is_empty());
    }
}
