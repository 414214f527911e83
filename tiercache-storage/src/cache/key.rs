//! Namespaced cache keys bound to a store and an expiration policy.
//!
//! A [`KeyBuilder`] fixes the namespace, prefix and number of components.
//! Each call to [`KeyBuilder::key`] renders the components with the
//! converter's canonical rendering and returns a [`KeyHandle`] that runs
//! cache operations against that key.
//!
//! Key format: `namespace:prefix_component1_component2...`. The `_`
//! separator is not escaped, so callers must pick components whose
//! renderings cannot collide.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tiercache_core::{CacheError, CacheResult, Coercible, Complex, Converter, Value};
use tracing::trace;
use uuid::Uuid;

use super::expiration::ExpirationPolicy;
use super::traits::{CacheStore, CacheStoreExt};

// ============================================================================
// KEY COMPONENTS
// ============================================================================

/// A value that can appear in a cache key.
pub trait KeyComponent {
    fn key_value(&self) -> Value;
}

macro_rules! key_component {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyComponent for $ty {
                fn key_value(&self) -> Value {
                    self.to_value()
                }
            }
        )*
    };
}

key_component!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    Complex,
    DateTime<Utc>,
    Uuid,
);

impl KeyComponent for str {
    fn key_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl KeyComponent for Value {
    fn key_value(&self) -> Value {
        self.clone()
    }
}

/// `None` renders as nil and is rejected by key construction.
impl<T: KeyComponent> KeyComponent for Option<T> {
    fn key_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, KeyComponent::key_value)
    }
}

impl<T: KeyComponent + ?Sized> KeyComponent for &T {
    fn key_value(&self) -> Value {
        (**self).key_value()
    }
}

impl<T: KeyComponent + ?Sized> KeyComponent for Box<T> {
    fn key_value(&self) -> Value {
        (**self).key_value()
    }
}

impl<T: KeyComponent + ?Sized> KeyComponent for Arc<T> {
    fn key_value(&self) -> Value {
        (**self).key_value()
    }
}

/// Uses a type's `Display` output as its key rendering.
#[derive(Debug, Clone, Copy)]
pub struct Rendered<T>(pub T);

impl<T: fmt::Display> KeyComponent for Rendered<T> {
    fn key_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

/// An ordered list of key components.
///
/// Implemented for tuples of up to eight [`KeyComponent`]s and for runtime
/// lists of [`Value`]s.
pub trait KeyComponents {
    fn into_values(self) -> Vec<Value>;
}

impl KeyComponents for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! key_components_tuple {
    ($($name:ident),+) => {
        impl<$($name: KeyComponent),+> KeyComponents for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.key_value()),+]
            }
        }
    };
}

key_components_tuple!(A);
key_components_tuple!(A, B);
key_components_tuple!(A, B, C);
key_components_tuple!(A, B, C, D);
key_components_tuple!(A, B, C, D, E);
key_components_tuple!(A, B, C, D, E, F);
key_components_tuple!(A, B, C, D, E, F, G);
key_components_tuple!(A, B, C, D, E, F, G, H);

impl KeyComponents for Vec<Value> {
    fn into_values(self) -> Vec<Value> {
        self
    }
}

impl KeyComponents for &[Value] {
    fn into_values(self) -> Vec<Value> {
        self.to_vec()
    }
}

// ============================================================================
// CACHE KEY
// ============================================================================

/// A fully rendered cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// KEY BUILDER
// ============================================================================

/// Builds [`KeyHandle`]s with a fixed namespace, prefix and component count.
#[derive(Clone)]
pub struct KeyBuilder {
    namespace: String,
    prefix: String,
    arity: usize,
    store: Arc<dyn CacheStore>,
    policy: Arc<ExpirationPolicy>,
    converter: Converter,
}

impl KeyBuilder {
    /// Fails when `namespace` or `prefix` is empty.
    pub fn new(
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        arity: usize,
        store: Arc<dyn CacheStore>,
        policy: Arc<ExpirationPolicy>,
    ) -> CacheResult<Self> {
        let namespace = namespace.into();
        let prefix = prefix.into();
        if namespace.is_empty() {
            return Err(CacheError::invalid("namespace", "namespace must not be empty"));
        }
        if prefix.is_empty() {
            return Err(CacheError::invalid("prefix", "prefix must not be empty"));
        }
        Ok(Self {
            namespace,
            prefix,
            arity,
            store,
            policy,
            converter: Converter::default(),
        })
    }

    /// Render components with `converter` instead of the default.
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Build the handle for one key.
    ///
    /// The component count must equal the builder's arity exactly. Nil
    /// components and components without a canonical rendering fail.
    pub fn key(&self, components: impl KeyComponents) -> CacheResult<KeyHandle> {
        let values = components.into_values();
        if values.len() != self.arity {
            return Err(CacheError::KeyArity {
                expected: self.arity,
                got: values.len(),
            });
        }

        let mut key = format!("{}:{}", self.namespace, self.prefix);
        for (i, value) in values.iter().enumerate() {
            let rendered = self
                .converter
                .render_simple(value)
                .map_err(|e| e.at_index(i))?;
            key.push('_');
            key.push_str(&rendered);
        }
        trace!(key = %key, "built cache key");

        Ok(KeyHandle {
            key: CacheKey(key),
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
        })
    }
}

impl fmt::Debug for KeyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBuilder")
            .field("namespace", &self.namespace)
            .field("prefix", &self.prefix)
            .field("arity", &self.arity)
            .field("store", &self.store.name())
            .field("policy", &self.policy)
            .finish()
    }
}

// ============================================================================
// KEY HANDLE
// ============================================================================

/// Cache operations on one rendered key.
///
/// Every write draws a fresh TTL from the bound policy.
#[derive(Clone)]
pub struct KeyHandle {
    key: CacheKey,
    store: Arc<dyn CacheStore>,
    policy: Arc<ExpirationPolicy>,
}

impl KeyHandle {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    fn ttl(&self) -> Duration {
        self.policy.next_duration()
    }

    /// Populate `out` when the key is present; leave it unchanged otherwise.
    pub fn get<T: Coercible>(&self, out: &mut T) -> CacheResult<()> {
        self.store.get(self.key.as_str(), out)
    }

    pub fn try_get<T: Coercible>(&self) -> CacheResult<Option<T>> {
        self.store.try_get(self.key.as_str())
    }

    /// Store `value` only when the key is absent.
    pub fn create<T: Coercible>(&self, value: &T) -> CacheResult<bool> {
        self.store.create(self.key.as_str(), value, self.ttl())
    }

    pub fn set<T: Coercible>(&self, value: &T) -> CacheResult<()> {
        self.store.set(self.key.as_str(), value, self.ttl())
    }

    pub fn remove(&self) -> CacheResult<bool> {
        self.store.remove(self.key.as_str())
    }

    pub fn increment(&self) -> CacheResult<i64> {
        self.store.increment(self.key.as_str())
    }

    pub fn increment_or_create(&self, delta: i64) -> CacheResult<i64> {
        self.store
            .increment_or_create(self.key.as_str(), delta, self.ttl())
    }

    #[track_caller]
    pub fn must_get<T: Coercible>(&self, out: &mut T) {
        self.store.must_get(self.key.as_str(), out)
    }

    #[track_caller]
    pub fn must_try_get<T: Coercible>(&self) -> Option<T> {
        self.store.must_try_get(self.key.as_str())
    }

    #[track_caller]
    pub fn must_create<T: Coercible>(&self, value: &T) -> bool {
        self.store.must_create(self.key.as_str(), value, self.ttl())
    }

    #[track_caller]
    pub fn must_set<T: Coercible>(&self, value: &T) {
        self.store.must_set(self.key.as_str(), value, self.ttl())
    }

    #[track_caller]
    pub fn must_remove(&self) -> bool {
        self.store.must_remove(self.key.as_str())
    }

    #[track_caller]
    pub fn must_increment(&self) -> i64 {
        self.store.must_increment(self.key.as_str())
    }

    #[track_caller]
    pub fn must_increment_or_create(&self, delta: i64) -> i64 {
        self.store
            .must_increment_or_create(self.key.as_str(), delta, self.ttl())
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("key", &self.key)
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use chrono::TimeZone;
    use tiercache_core::CoerceError;

    fn builder(prefix: &str, arity: usize) -> (Arc<MemoryStore>, KeyBuilder) {
        let store = Arc::new(MemoryStore::new());
        let builder = KeyBuilder::new(
            "go",
            prefix,
            arity,
            store.clone(),
            Arc::new(ExpirationPolicy::from_secs(60, 5).expect("policy should succeed")),
        )
        .expect("builder should succeed");
        (store, builder)
    }

    #[test]
    fn test_key_format() {
        let (_, b) = builder("cache:test", 2);
        let handle = b.key(("a", 1)).expect("key should succeed");
        assert_eq!(handle.key().to_string(), "go:cache:test_a_1");
    }

    #[test]
    fn test_zero_arity_key() {
        let (_, b) = builder("counter", 0);
        assert_eq!(b.key(()).expect("key should succeed").key().as_str(), "go:counter");
    }

    #[test]
    fn test_rejects_empty_namespace_or_prefix() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let policy = Arc::new(ExpirationPolicy::never());
        assert!(KeyBuilder::new("", "p", 1, store.clone(), policy.clone()).is_err());
        assert!(KeyBuilder::new("ns", "", 1, store, policy).is_err());
    }

    #[test]
    fn test_arity_must_match_exactly() {
        let (_, b) = builder("p", 2);
        assert!(matches!(
            b.key(("only",)),
            Err(CacheError::KeyArity { expected: 2, got: 1 })
        ));
        assert!(matches!(
            b.key(("a", "b", "c")),
            Err(CacheError::KeyArity { expected: 2, got: 3 })
        ));
        assert!(b.key(vec![Value::from("a"), Value::Int(2)]).is_ok());
    }

    #[test]
    fn test_component_renderings() {
        let (_, b) = builder("p", 4);
        let ts = Utc
            .timestamp_millis_opt(1_000)
            .single()
            .expect("timestamp should be in range");
        let handle = b
            .key((true, 2.5f64, ts, Rendered(std::net::Ipv4Addr::LOCALHOST)))
            .expect("key should succeed");
        assert_eq!(handle.key().as_str(), "go:p_1_2.5_1000_127.0.0.1");
    }

    #[test]
    fn test_rejects_nil_and_container_components() {
        let (_, b) = builder("p", 2);
        let err = b.key(("a", None::<i64>)).expect_err("nil component should fail");
        let CacheError::Coerce(coerce) = err else {
            panic!("expected a coercion error, got {:?}", err);
        };
        assert!(matches!(coerce, CoerceError::AtIndex { index: 1, .. }));

        assert!(b.key(("a", Value::Sequence(vec![]))).is_err());
        assert!(b.key(("a", Some(3))).is_ok());
    }

    #[test]
    fn test_handle_operations() {
        let (store, b) = builder("user", 1);
        let handle = b.key((42u64,)).expect("key should succeed");

        assert!(handle.create(&"ada".to_string()).expect("create should succeed"));
        assert!(!handle.create(&"bob".to_string()).expect("create should succeed"));
        assert_eq!(
            handle.try_get::<String>().expect("get should succeed").as_deref(),
            Some("ada")
        );
        assert!(store.try_get::<String>("go:user_42").expect("get should succeed").is_some());

        handle.set(&"eve".to_string()).expect("set should succeed");
        let mut out = String::new();
        handle.get(&mut out).expect("get should succeed");
        assert_eq!(out, "eve");

        assert!(handle.remove().expect("remove should succeed"));
        assert!(!handle.remove().expect("remove should succeed"));
    }

    #[test]
    fn test_handle_counters() {
        let (_, b) = builder("hits", 1);
        let handle = b.key(("page",)).expect("key should succeed");
        assert!(handle.increment().expect_err("absent should fail").is_not_found());
        assert_eq!(handle.increment_or_create(5).expect("should succeed"), 5);
        assert_eq!(handle.increment().expect("increment should succeed"), 6);
        assert_eq!(handle.must_increment_or_create(4), 10);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_key_is_deterministic(word in "[a-z]{1,8}", n in any::<i64>()) {
            let b = KeyBuilder::new(
                "ns",
                "p",
                2,
                Arc::new(MemoryStore::new()),
                Arc::new(ExpirationPolicy::never()),
            )
            .expect("builder should succeed");
            let first = b.key((word.as_str(), n)).expect("key should succeed");
            let second = b.key((word.clone(), n)).expect("key should succeed");
            prop_assert_eq!(first.key(), second.key());
            prop_assert_eq!(first.key().as_str(), format!("ns:p_{}_{}", word, n));
        }
    }
}
