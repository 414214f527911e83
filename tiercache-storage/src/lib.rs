//! tiercache storage - cache stores, tiering and keyed access
//!
//! Backing stores implement [`CacheStore`]. [`MemoryStore`] keeps entries
//! in-process; [`RedisStore`] talks to a Redis server and stores JSON
//! payloads. [`TieredStore`] puts a fast store in front of an authoritative
//! one, and [`KeyBuilder`] produces namespaced [`KeyHandle`]s bound to a
//! store and an [`ExpirationPolicy`].

pub mod cache;
pub mod codec;
pub mod config;

pub use cache::{
    CacheKey, CacheStats, CacheStore, CacheStoreExt, ExpirationPolicy, KeyBuilder, KeyComponent,
    KeyComponents, KeyHandle, MemoryStore, RedisStore, Rendered, SweeperHandle, TierStats,
    TieredStore, DEFAULT_MAX_INCREMENT_RETRIES, DEFAULT_POOL_SIZE, NO_EXPIRATION,
};
pub use codec::{decode_payload, encode_payload};
pub use config::{
    ConverterConfig, ExpirationConfig, MemoryStoreConfig, RedisStoreConfig, TierCacheConfig,
};

// Re-export core types for convenience
pub use tiercache_core::{CacheError, CacheResult, Coercible, Converter, Shape, Value};
