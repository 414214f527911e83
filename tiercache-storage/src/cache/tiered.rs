//! Two-tier cache composition.
//!
//! A fast, short-lived tier sits in front of a slower authoritative tier.
//! Reads fall through to the slow tier and backfill the fast one; writes go
//! to the slow tier first and are mirrored into the fast tier.
//!
//! The fast tier is advisory. A concurrent write can race with a backfill
//! and leave a stale fast entry until its TTL elapses; create and remove
//! decisions always come from the slow tier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tiercache_core::{CacheError, CacheResult, Shape, Value};
use tracing::{debug, warn};

use super::expiration::ExpirationPolicy;
use super::traits::{CacheStats, CacheStore};

const STORE_NAME: &str = "tiered";

/// Per-tier read counters for a [`TieredStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    pub fast_hits: u64,
    pub slow_hits: u64,
    pub misses: u64,
    /// Slow-tier hits successfully copied into the fast tier.
    pub backfills: u64,
}

#[derive(Debug, Default)]
struct TierCounters {
    fast_hits: AtomicU64,
    slow_hits: AtomicU64,
    misses: AtomicU64,
    backfills: AtomicU64,
}

/// Fast tier in front of an authoritative slow tier.
///
/// Increments are not supported: two independently mutable tiers cannot be
/// kept atomic under the same key without a distributed lock.
pub struct TieredStore {
    fast: Arc<dyn CacheStore>,
    slow: Arc<dyn CacheStore>,
    fast_policy: Arc<ExpirationPolicy>,
    counters: TierCounters,
}

impl TieredStore {
    /// Compose two stores. Entries mirrored into `fast` get TTLs drawn from
    /// `fast_policy`.
    ///
    /// Fails when both tiers are the same store instance.
    pub fn new(
        fast: Arc<dyn CacheStore>,
        slow: Arc<dyn CacheStore>,
        fast_policy: Arc<ExpirationPolicy>,
    ) -> CacheResult<Self> {
        if std::ptr::addr_eq(Arc::as_ptr(&fast), Arc::as_ptr(&slow)) {
            return Err(CacheError::invalid(
                "fast",
                "fast and slow tiers must be distinct stores",
            ));
        }
        Ok(Self {
            fast,
            slow,
            fast_policy,
            counters: TierCounters::default(),
        })
    }

    pub fn fast(&self) -> &Arc<dyn CacheStore> {
        &self.fast
    }

    pub fn slow(&self) -> &Arc<dyn CacheStore> {
        &self.slow
    }

    pub fn tier_stats(&self) -> TierStats {
        TierStats {
            fast_hits: self.counters.fast_hits.load(Ordering::Relaxed),
            slow_hits: self.counters.slow_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            backfills: self.counters.backfills.load(Ordering::Relaxed),
        }
    }

    /// Copy `value` into the fast tier. Failures are logged, never returned.
    fn mirror(&self, key: &str, value: &Value) -> bool {
        let ttl = self.fast_policy.next_duration();
        match self.fast.set_value(key, value, ttl) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, store = self.fast.name(), error = %e, "failed to mirror into fast tier");
                false
            }
        }
    }
}

impl CacheStore for TieredStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    #[tracing::instrument(skip(self, shape), fields(tier))]
    fn try_get_value(&self, key: &str, shape: &Shape) -> CacheResult<Option<Value>> {
        if let Some(value) = self.fast.try_get_value(key, shape)? {
            tracing::Span::current().record("tier", "fast");
            self.counters.fast_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "fast tier hit");
            return Ok(Some(value));
        }

        match self.slow.try_get_value(key, shape)? {
            Some(value) => {
                tracing::Span::current().record("tier", "slow");
                self.counters.slow_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "slow tier hit, backfilling fast tier");
                if self.mirror(key, &value) {
                    self.counters.backfills.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Some(value))
            }
            None => {
                tracing::Span::current().record("tier", "miss");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "miss in both tiers");
                Ok(None)
            }
        }
    }

    fn create_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<bool> {
        let created = self.slow.create_value(key, value, ttl)?;
        if created {
            self.mirror(key, value);
        }
        Ok(created)
    }

    fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        self.slow.set_value(key, value, ttl)?;
        self.mirror(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let removed = self.slow.remove(key);
        if let Err(e) = self.fast.remove(key) {
            warn!(key = %key, store = self.fast.name(), error = %e, "failed to remove from fast tier");
        }
        removed
    }

    fn increment(&self, _key: &str) -> CacheResult<i64> {
        Err(CacheError::UnsupportedOperation {
            store: STORE_NAME,
            operation: "increment",
        })
    }

    fn increment_or_create(&self, _key: &str, _delta: i64, _ttl: Duration) -> CacheResult<i64> {
        Err(CacheError::UnsupportedOperation {
            store: STORE_NAME,
            operation: "increment_or_create",
        })
    }

    /// Hits count reads answered by either tier.
    fn stats(&self) -> CacheStats {
        let tiers = self.tier_stats();
        CacheStats {
            hits: tiers.fast_hits + tiers.slow_hits,
            misses: tiers.misses,
            ..self.slow.stats()
        }
    }
}
