//! Cache stores, expiration and key construction.
//!
//! Every backing store implements the object-safe [`CacheStore`] contract
//! over dynamic values; [`CacheStoreExt`] adds the typed operations. The
//! [`TieredStore`] composes two stores, and [`KeyBuilder`] binds rendered
//! keys to a store and an [`ExpirationPolicy`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tiercache_storage::cache::{ExpirationPolicy, KeyBuilder, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let policy = Arc::new(ExpirationPolicy::from_secs(60, 5).unwrap());
//! let users = KeyBuilder::new("app", "user", 1, store, policy).unwrap();
//!
//! let handle = users.key((42,)).unwrap();
//! handle.set(&"ada".to_string()).unwrap();
//! assert_eq!(handle.try_get::<String>().unwrap().as_deref(), Some("ada"));
//! ```

pub mod expiration;
pub mod key;
pub mod memory;
pub mod redis_backend;
pub mod tiered;
pub mod traits;

pub use expiration::ExpirationPolicy;
pub use key::{CacheKey, KeyBuilder, KeyComponent, KeyComponents, KeyHandle, Rendered};
pub use memory::{MemoryStore, SweeperHandle, DEFAULT_MAX_INCREMENT_RETRIES};
pub use redis_backend::{RedisStore, DEFAULT_POOL_SIZE};
pub use tiered::{TierStats, TieredStore};
pub use traits::{CacheStats, CacheStore, CacheStoreExt, NO_EXPIRATION};
