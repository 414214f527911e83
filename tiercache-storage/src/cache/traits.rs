//! Cache store contract and its typed extension.
//!
//! [`CacheStore`] is the narrow, object-safe operation set every backing
//! store implements over dynamic [`Value`]s. [`CacheStoreExt`] layers the
//! typed operations on top of it for any store, including `dyn CacheStore`.

use std::time::Duration;

use tiercache_core::{CacheResult, Coercible, Shape, Value};

/// TTL meaning "never expires".
pub const NO_EXPIRATION: Duration = Duration::ZERO;

/// Operations a backing key-value store must provide.
///
/// # Semantics
///
/// | Operation | Result |
/// |---|---|
/// | `try_get_value` | `None` when absent, otherwise the stored value coerced into `shape` |
/// | `create_value` | `true` and stores only when the key was absent |
/// | `set_value` | unconditional upsert |
/// | `remove` | `true` when a key was actually deleted |
/// | `increment` | adds 1 atomically, `NotFound` when absent |
/// | `increment_or_create` | creates with `delta` and `ttl` when absent, otherwise adds `delta` |
///
/// A zero `ttl` ([`NO_EXPIRATION`]) stores the entry without expiry.
pub trait CacheStore: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn try_get_value(&self, key: &str, shape: &Shape) -> CacheResult<Option<Value>>;

    fn create_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<bool>;

    fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()>;

    fn remove(&self, key: &str) -> CacheResult<bool>;

    fn increment(&self, key: &str) -> CacheResult<i64>;

    fn increment_or_create(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64>;

    /// Usage counters. Stores that do not track usage report zeros.
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Typed operations over any [`CacheStore`].
///
/// The `must_*` variants panic on error. Use them only where a failure is
/// already treated as unrecoverable by the caller.
pub trait CacheStoreExt: CacheStore {
    /// Populate `out` when `key` is present. An absent key leaves `out` unchanged.
    fn get<T: Coercible>(&self, key: &str, out: &mut T) -> CacheResult<()> {
        if let Some(found) = self.try_get::<T>(key)? {
            *out = found;
        }
        Ok(())
    }

    fn try_get<T: Coercible>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.try_get_value(key, &T::shape())? {
            Some(value) => Ok(Some(T::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn create<T: Coercible>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<bool> {
        self.create_value(key, &value.to_value(), ttl)
    }

    fn set<T: Coercible>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        self.set_value(key, &value.to_value(), ttl)
    }

    #[track_caller]
    fn must_get<T: Coercible>(&self, key: &str, out: &mut T) {
        if let Err(e) = self.get(key, out) {
            panic!("cache get on {} failed for {}: {}", self.name(), key, e);
        }
    }

    #[track_caller]
    fn must_try_get<T: Coercible>(&self, key: &str) -> Option<T> {
        self.try_get(key)
            .unwrap_or_else(|e| panic!("cache try_get on {} failed for {}: {}", self.name(), key, e))
    }

    #[track_caller]
    fn must_create<T: Coercible>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        self.create(key, value, ttl)
            .unwrap_or_else(|e| panic!("cache create on {} failed for {}: {}", self.name(), key, e))
    }

    #[track_caller]
    fn must_set<T: Coercible>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(e) = self.set(key, value, ttl) {
            panic!("cache set on {} failed for {}: {}", self.name(), key, e);
        }
    }

    #[track_caller]
    fn must_remove(&self, key: &str) -> bool {
        self.remove(key)
            .unwrap_or_else(|e| panic!("cache remove on {} failed for {}: {}", self.name(), key, e))
    }

    #[track_caller]
    fn must_increment(&self, key: &str) -> i64 {
        self.increment(key).unwrap_or_else(|e| {
            panic!("cache increment on {} failed for {}: {}", self.name(), key, e)
        })
    }

    #[track_caller]
    fn must_increment_or_create(&self, key: &str, delta: i64, ttl: Duration) -> i64 {
        self.increment_or_create(key, delta, ttl).unwrap_or_else(|e| {
            panic!(
                "cache increment_or_create on {} failed for {}: {}",
                self.name(),
                key,
                e
            )
        })
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently held, including expired ones not yet swept.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expired: u64,
    /// Number of optimistic increment attempts that lost a race.
    pub conflicts: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
