//! Configuration types

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tiercache_core::{CacheError, CacheResult, ConfigError, Converter, DEFAULT_SEQUENCE_DELIMITER};

use crate::cache::{
    CacheStore, ExpirationPolicy, KeyBuilder, MemoryStore, RedisStore, SweeperHandle,
    DEFAULT_MAX_INCREMENT_RETRIES, DEFAULT_POOL_SIZE,
};

/// Top-level configuration for a tiercache deployment.
///
/// Loaded from TOML with [`TierCacheConfig::from_toml_str`] or from
/// `TIERCACHE_*` variables with [`TierCacheConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCacheConfig {
    /// Namespace prepended to every key. Required.
    pub namespace: String,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub memory: MemoryStoreConfig,
    /// Network store. Absent means memory-only.
    #[serde(default)]
    pub redis: Option<RedisStoreConfig>,
    #[serde(default = "ExpirationConfig::fast_tier")]
    pub fast_tier: ExpirationConfig,
    #[serde(default)]
    pub default_expiration: ExpirationConfig,
}

impl Default for TierCacheConfig {
    fn default() -> Self {
        Self {
            namespace: "tiercache".to_string(),
            converter: ConverterConfig::default(),
            memory: MemoryStoreConfig::default(),
            redis: None,
            fast_tier: ExpirationConfig::fast_tier(),
            default_expiration: ExpirationConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl TierCacheConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> CacheResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TIERCACHE_NAMESPACE`: Key namespace (default: tiercache)
    /// - `TIERCACHE_SEQUENCE_DELIMITER`: String-to-sequence delimiter (default: ~)
    /// - `TIERCACHE_CASE_INSENSITIVE_FIELDS`: "true" or "false" (default: false)
    /// - `TIERCACHE_SWEEP_INTERVAL_MS`: Memory store sweep interval, 0 disables (default: 60000)
    /// - `TIERCACHE_MAX_INCREMENT_RETRIES`: Optimistic increment budget (default: 3)
    /// - `TIERCACHE_REDIS_URL`: Redis URL; unset means memory-only
    /// - `TIERCACHE_REDIS_POOL_SIZE`: Idle Redis connections kept (default: 4)
    /// - `TIERCACHE_FAST_TIER_BASE_MS` / `TIERCACHE_FAST_TIER_JITTER_MS`: Fast tier TTL (default: 3000 / 500)
    /// - `TIERCACHE_DEFAULT_BASE_MS` / `TIERCACHE_DEFAULT_JITTER_MS`: Key TTL (default: 0 / 0, never expires)
    ///
    /// The result is not validated; call [`TierCacheConfig::validate`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_increment_retries = env_parse("TIERCACHE_MAX_INCREMENT_RETRIES")
            .unwrap_or(defaults.memory.max_increment_retries);

        let redis = std::env::var("TIERCACHE_REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RedisStoreConfig {
                url,
                pool_size: env_parse("TIERCACHE_REDIS_POOL_SIZE").unwrap_or(DEFAULT_POOL_SIZE),
                max_increment_retries,
            });

        Self {
            namespace: std::env::var("TIERCACHE_NAMESPACE").unwrap_or(defaults.namespace),
            converter: ConverterConfig {
                sequence_delimiter: std::env::var("TIERCACHE_SEQUENCE_DELIMITER")
                    .unwrap_or(defaults.converter.sequence_delimiter),
                case_insensitive_fields: std::env::var("TIERCACHE_CASE_INSENSITIVE_FIELDS")
                    .ok()
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(defaults.converter.case_insensitive_fields),
            },
            memory: MemoryStoreConfig {
                sweep_interval_ms: env_parse("TIERCACHE_SWEEP_INTERVAL_MS")
                    .unwrap_or(defaults.memory.sweep_interval_ms),
                max_increment_retries,
            },
            redis,
            fast_tier: ExpirationConfig {
                base_ms: env_parse("TIERCACHE_FAST_TIER_BASE_MS")
                    .unwrap_or(defaults.fast_tier.base_ms),
                jitter_ms: env_parse("TIERCACHE_FAST_TIER_JITTER_MS")
                    .unwrap_or(defaults.fast_tier.jitter_ms),
            },
            default_expiration: ExpirationConfig {
                base_ms: env_parse("TIERCACHE_DEFAULT_BASE_MS")
                    .unwrap_or(defaults.default_expiration.base_ms),
                jitter_ms: env_parse("TIERCACHE_DEFAULT_JITTER_MS")
                    .unwrap_or(defaults.default_expiration.jitter_ms),
            },
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CacheResult<()> {
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "namespace".to_string(),
            }
            .into());
        }

        if self.converter.sequence_delimiter.is_empty() {
            return Err(invalid(
                "converter.sequence_delimiter",
                "",
                "sequence_delimiter must not be empty",
            ));
        }

        if self.memory.max_increment_retries == 0 {
            return Err(invalid(
                "memory.max_increment_retries",
                0,
                "max_increment_retries must be greater than 0",
            ));
        }

        if let Some(redis) = &self.redis {
            if redis.url.trim().is_empty() {
                return Err(invalid("redis.url", "", "url must not be empty"));
            }
            if redis.pool_size == 0 {
                return Err(invalid("redis.pool_size", 0, "pool_size must be greater than 0"));
            }
            if redis.max_increment_retries == 0 {
                return Err(invalid(
                    "redis.max_increment_retries",
                    0,
                    "max_increment_retries must be greater than 0",
                ));
            }
        }

        self.fast_tier.validate("fast_tier")?;
        self.default_expiration.validate("default_expiration")?;
        Ok(())
    }

    /// Key builder under this namespace, using the default expiration and
    /// the configured converter.
    pub fn key_builder(
        &self,
        prefix: impl Into<String>,
        arity: usize,
        store: Arc<dyn CacheStore>,
    ) -> CacheResult<KeyBuilder> {
        let policy = Arc::new(self.default_expiration.build()?);
        Ok(KeyBuilder::new(self.namespace.clone(), prefix, arity, store, policy)?
            .with_converter(self.converter.build()))
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> CacheError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Coercion engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub sequence_delimiter: String,
    /// Match record fields to mapping keys ignoring case (Unicode lowercase).
    pub case_insensitive_fields: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            sequence_delimiter: DEFAULT_SEQUENCE_DELIMITER.to_string(),
            case_insensitive_fields: false,
        }
    }
}

impl ConverterConfig {
    pub fn build(&self) -> Converter {
        let converter = Converter::new().with_delimiter(self.sequence_delimiter.clone());
        if self.case_insensitive_fields {
            converter.case_insensitive()
        } else {
            converter
        }
    }
}

/// In-process store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Background sweep period in milliseconds. Zero disables the sweeper.
    pub sweep_interval_ms: u64,
    pub max_increment_retries: u32,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 60_000,
            max_increment_retries: DEFAULT_MAX_INCREMENT_RETRIES,
        }
    }
}

impl MemoryStoreConfig {
    /// Build the store without a background sweeper. Expired entries are
    /// still dropped lazily on access.
    pub fn build(&self, converter: Converter) -> MemoryStore {
        MemoryStore::new()
            .with_converter(converter)
            .with_max_increment_retries(self.max_increment_retries)
    }

    /// Build the store and start its sweeper when `sweep_interval_ms` is
    /// non-zero. The sweeper stops when the returned handle is dropped.
    pub fn start(
        &self,
        converter: Converter,
    ) -> CacheResult<(Arc<MemoryStore>, Option<SweeperHandle>)> {
        let store = Arc::new(self.build(converter));
        let sweeper = match self.sweep_interval() {
            Some(interval) => Some(store.spawn_sweeper(interval)?),
            None => None,
        };
        Ok((store, sweeper))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

/// Redis store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_increment_retries")]
    pub max_increment_retries: u32,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_max_increment_retries() -> u32 {
    DEFAULT_MAX_INCREMENT_RETRIES
}

impl RedisStoreConfig {
    pub fn connect(&self, converter: Converter) -> CacheResult<RedisStore> {
        RedisStore::connect_with(
            &self.url,
            self.pool_size,
            self.max_increment_retries,
            converter,
        )
    }
}

/// Base TTL and jitter in milliseconds. A zero base never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    pub base_ms: u64,
    pub jitter_ms: u64,
}

impl ExpirationConfig {
    /// Default fast-tier TTL: 3s with 500ms jitter.
    pub fn fast_tier() -> Self {
        Self {
            base_ms: 3_000,
            jitter_ms: 500,
        }
    }

    fn validate(&self, section: &str) -> CacheResult<()> {
        if self.jitter_ms > self.base_ms {
            return Err(invalid(
                &format!("{}.jitter_ms", section),
                self.jitter_ms,
                "jitter_ms must not exceed base_ms",
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> CacheResult<ExpirationPolicy> {
        ExpirationPolicy::new(
            Duration::from_millis(self.base_ms),
            Duration::from_millis(self.jitter_ms),
        )
    }
}
