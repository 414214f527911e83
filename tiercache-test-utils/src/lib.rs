//! tiercache Test Utilities
//!
//! Shared test infrastructure for the tiercache workspace:
//! - Tracing setup for tests
//! - Proptest generators for values and records
//! - Record fixtures and store fixtures
//! - A failure-injecting store
//! - Assertions over `CacheResult`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tiercache_core::{cache_record, CacheError, CacheResult, Shape, Value};
use tiercache_storage::{CacheStats, CacheStore, ExpirationPolicy, MemoryStore, TieredStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// Re-export core types for convenience
pub use tiercache_core::{Coercible, Converter};

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RECORD TYPES
// ============================================================================

cache_record! {
    /// Small flat record.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Profile {
        pub name: String,
        pub age: i32,
    }
}

cache_record! {
    /// Record with nested, sequence and timestamp fields.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Account {
        pub id: Uuid,
        pub owner: Profile,
        pub tags: Vec<String>,
        pub created_at: DateTime<Utc>,
        pub balance: f64,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tiercache values and records.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a millisecond-precision timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1_577_836_800_000i64..1_893_456_000_000i64)
            .prop_map(|ms| DateTime::from_timestamp_millis(ms).unwrap_or_default())
    }

    /// Generate a key-safe word (no `_` separator).
    pub fn arb_key_word() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,12}"
    }

    /// Generate a primitive value of any width.
    pub fn arb_primitive() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<u64>().prop_map(Value::UInt),
            (-1e12f64..1e12).prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        ]
    }

    /// Generate a primitive or timestamp value.
    pub fn arb_simple_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            4 => arb_primitive(),
            1 => arb_timestamp().prop_map(Value::Timestamp),
        ]
    }

    /// Generate a Profile.
    pub fn arb_profile() -> impl Strategy<Value = Profile> {
        ("[a-zA-Z ]{0,12}", 0i32..130).prop_map(|(name, age)| Profile { name, age })
    }

    /// Generate an Account.
    pub fn arb_account() -> impl Strategy<Value = Account> {
        (
            arb_uuid(),
            arb_profile(),
            prop::collection::vec("[a-z]{1,8}", 0..4),
            arb_timestamp(),
            -1e9f64..1e9,
        )
            .prop_map(|(id, owner, tags, created_at, balance)| Account {
                id,
                owner,
                tags,
                created_at,
                balance,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and store layouts.

    use super::*;

    pub fn profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            age: 36,
        }
    }

    pub fn account() -> Account {
        Account {
            id: Uuid::now_v7(),
            owner: profile(),
            tags: vec!["vip".to_string(), "beta".to_string()],
            created_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap_or_default(),
            balance: 1250.75,
        }
    }

    /// Two memory stores behind a [`TieredStore`].
    pub struct MemoryTiers {
        pub fast: Arc<MemoryStore>,
        pub slow: Arc<MemoryStore>,
        pub tiered: Arc<TieredStore>,
    }

    /// Memory tiers whose fast-tier entries live for `fast_ttl`.
    pub fn memory_tiers(fast_ttl: Duration) -> MemoryTiers {
        let fast = Arc::new(MemoryStore::new());
        let slow = Arc::new(MemoryStore::new());
        let policy = ExpirationPolicy::new(fast_ttl, Duration::ZERO)
            .unwrap_or_else(|e| panic!("fixture policy is invalid: {}", e));
        let tiered = TieredStore::new(fast.clone(), slow.clone(), Arc::new(policy))
            .unwrap_or_else(|e| panic!("fixture tiers are invalid: {}", e));
        MemoryTiers {
            fast,
            slow,
            tiered: Arc::new(tiered),
        }
    }
}

// ============================================================================
// FAILURE INJECTION
// ============================================================================

/// Memory store that fails reads or writes on demand.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> CacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(CacheError::backend(
                "faulty",
                format!("injected {} failure", operation),
            ))
        } else {
            Ok(())
        }
    }
}

impl CacheStore for FaultyStore {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn try_get_value(&self, key: &str, shape: &Shape) -> CacheResult<Option<Value>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.try_get_value(key, shape)
    }

    fn create_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<bool> {
        self.check(&self.fail_writes, "write")?;
        self.inner.create_value(key, value, ttl)
    }

    fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        self.check(&self.fail_writes, "write")?;
        self.inner.set_value(key, value, ttl)
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        self.check(&self.fail_writes, "write")?;
        self.inner.remove(key)
    }

    fn increment(&self, key: &str) -> CacheResult<i64> {
        self.check(&self.fail_writes, "write")?;
        self.inner.increment(key)
    }

    fn increment_or_create(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        self.check(&self.fail_writes, "write")?;
        self.inner.increment_or_create(key, delta, ttl)
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over tiercache results.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::NotFound { .. }) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unsupported_operation<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::UnsupportedOperation { .. }) => {}
            other => panic!("Expected UnsupportedOperation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &CacheResult<T>, store: &str) {
        match result {
            Err(CacheError::Backend { store: s, .. }) => {
                assert_eq!(s, store, "Wrong store in Backend error");
            }
            other => panic!("Expected Backend error from {}, got: {:?}", store, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tiercache_storage::CacheStoreExt;

    #[test]
    fn test_account_fixture_round_trips_through_value() {
        let account = fixtures::account();
        let back = Account::from_value(account.to_value()).expect("from_value should succeed");
        assert_eq!(back, account);
    }

    #[test]
    fn test_faulty_store_injects_failures() {
        let store = FaultyStore::new();
        store.set("k", &1i64, Duration::ZERO).expect("set should succeed");

        store.fail_reads(true);
        assertions::assert_backend_error(&store.try_get::<i64>("k"), "faulty");
        store.fail_reads(false);
        assert_eq!(store.try_get::<i64>("k").expect("get should succeed"), Some(1));

        store.fail_writes(true);
        assertions::assert_backend_error(&store.remove("k"), "faulty");
        assert_eq!(store.inner().len(), 1);
    }

    #[test]
    fn test_memory_tiers_fixture() {
        let tiers = fixtures::memory_tiers(Duration::from_secs(1));
        tiers.tiered.set("k", &fixtures::profile(), Duration::ZERO).expect("set should succeed");
        assert_eq!(tiers.fast.len(), 1);
        assert_eq!(tiers.slow.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_arb_account_is_coercible(account in generators::arb_account()) {
            let back = Account::from_value(account.to_value()).expect("from_value should succeed");
            prop_assert_eq!(back, account);
        }
    }
}
