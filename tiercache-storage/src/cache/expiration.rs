//! Jittered time-to-live policy.
//!
//! Every write draws a fresh TTL so that entries written together do not
//! expire together.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tiercache_core::{CacheError, CacheResult};

/// Base TTL perturbed by up to `jitter` in either direction.
///
/// A zero base means "never expires" and ignores jitter. The random source is
/// owned by the policy and locked per draw, so one policy can be shared by
/// many key handles across threads.
pub struct ExpirationPolicy {
    base: Duration,
    jitter: Duration,
    rng: Mutex<StdRng>,
}

impl ExpirationPolicy {
    /// Create a policy. Fails when `jitter` exceeds `base`.
    pub fn new(base: Duration, jitter: Duration) -> CacheResult<Self> {
        if jitter > base {
            return Err(CacheError::invalid(
                "jitter",
                format!("jitter {:?} must not exceed base {:?}", jitter, base),
            ));
        }
        Ok(Self {
            base,
            jitter,
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Policy whose TTL is always zero.
    pub fn never() -> Self {
        Self {
            base: Duration::ZERO,
            jitter: Duration::ZERO,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn from_millis(base: i64, jitter: i64) -> CacheResult<Self> {
        Self::from_signed(base, jitter, 1)
    }

    pub fn from_secs(base: i64, jitter: i64) -> CacheResult<Self> {
        Self::from_signed(base, jitter, 1_000)
    }

    pub fn from_minutes(base: i64, jitter: i64) -> CacheResult<Self> {
        Self::from_signed(base, jitter, 60_000)
    }

    pub fn from_hours(base: i64, jitter: i64) -> CacheResult<Self> {
        Self::from_signed(base, jitter, 3_600_000)
    }

    fn from_signed(base: i64, jitter: i64, unit_ms: u64) -> CacheResult<Self> {
        let to_duration = |field: &str, n: i64| -> CacheResult<Duration> {
            let n = u64::try_from(n)
                .map_err(|_| CacheError::invalid(field, format!("{} must not be negative", n)))?;
            Ok(Duration::from_millis(n.saturating_mul(unit_ms)))
        };
        Self::new(to_duration("base", base)?, to_duration("jitter", jitter)?)
    }

    /// Reseed the random source, for reproducible draws.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    pub fn is_never(&self) -> bool {
        self.base.is_zero()
    }

    /// Draw the TTL for one write.
    ///
    /// Returns `base - d` or `base + d` with `d` uniform in `[0, jitter)`, or
    /// zero when the base is zero.
    pub fn next_duration(&self) -> Duration {
        if self.base.is_zero() || self.jitter.is_zero() {
            return self.base;
        }
        let span = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        let (shorten, draw) = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (rng.random::<bool>(), rng.random_range(0..span))
        };
        let draw = Duration::from_nanos(draw);
        if shorten {
            self.base.saturating_sub(draw)
        } else {
            self.base.saturating_add(draw)
        }
    }
}

impl fmt::Debug for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationPolicy")
            .field("base", &self.base)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::never()
    }
}
