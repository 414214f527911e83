//! Redis-backed cache store.
//!
//! Payloads are JSON documents produced by [`crate::codec`]. Reads decode
//! the document and reshape it into the requested shape.
//!
//! | Operation | Commands |
//! |---|---|
//! | create | `SET key payload NX [PX ttl]` |
//! | set | `SET key payload [PX ttl]` |
//! | remove | `DEL key` |
//! | increment | `WATCH key`, `GET key`, `MULTI INCR key EXEC`, retried on abort |
//! | increment_or_create | `INCRBY key delta`, then `PEXPIRE` when the result equals `delta` |
//!
//! `increment_or_create` applies the TTL in a second command, and only when
//! the returned value shows the key was created by this call. A key created
//! concurrently at that boundary can keep a stale TTL.

use std::sync::Mutex;
use std::time::Duration;

use redis::{Client, Connection, RedisResult};
use tiercache_core::{CacheError, CacheResult, Converter, Shape, Value};
use tracing::debug;

use super::memory::DEFAULT_MAX_INCREMENT_RETRIES;
use super::traits::CacheStore;
use crate::codec::{decode_payload, encode_payload};

/// Default number of idle connections kept for reuse.
pub const DEFAULT_POOL_SIZE: usize = 4;

const STORE_NAME: &str = "redis";

enum IncrementOutcome {
    Missing,
    Aborted,
    Done(i64),
}

/// [`CacheStore`] over a Redis server, using the blocking client.
pub struct RedisStore {
    client: Client,
    idle: Mutex<Vec<Connection>>,
    pool_size: usize,
    converter: Converter,
    max_increment_retries: u32,
}

impl RedisStore {
    /// Connect with default pool size, retry budget and converter.
    pub fn connect(url: &str) -> CacheResult<Self> {
        Self::connect_with(
            url,
            DEFAULT_POOL_SIZE,
            DEFAULT_MAX_INCREMENT_RETRIES,
            Converter::default(),
        )
    }

    /// Connect and verify the server answers `PING`.
    pub fn connect_with(
        url: &str,
        pool_size: usize,
        max_increment_retries: u32,
        converter: Converter,
    ) -> CacheResult<Self> {
        let client = Client::open(url).map_err(|e| CacheError::backend(STORE_NAME, e))?;
        let store = Self {
            client,
            idle: Mutex::new(Vec::with_capacity(pool_size)),
            pool_size: pool_size.max(1),
            converter,
            max_increment_retries: max_increment_retries.max(1),
        };
        store.with_connection(|conn| redis::cmd("PING").query::<String>(conn))?;
        Ok(store)
    }

    /// Run `f` on a pooled connection. Connections that saw an error are
    /// dropped instead of returned to the pool.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> CacheResult<T> {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self
                .client
                .get_connection()
                .map_err(|e| CacheError::backend(STORE_NAME, e))?,
        };

        let result = f(&mut conn).map_err(|e| CacheError::backend(STORE_NAME, e))?;

        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.pool_size {
            idle.push(conn);
        }
        Ok(result)
    }

    fn encode(&self, value: &Value) -> CacheResult<String> {
        encode_payload(&self.converter, value)
    }
}

fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        None
    } else {
        // Sub-millisecond TTLs round up so they still expire.
        Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
    }
}

impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    fn try_get_value(&self, key: &str, shape: &Shape) -> CacheResult<Option<Value>> {
        let payload: Option<String> =
            self.with_connection(|conn| redis::cmd("GET").arg(key).query(conn))?;
        match payload {
            Some(payload) => {
                let decoded = decode_payload(&payload)?;
                Ok(Some(self.converter.coerce(decoded, shape)?))
            }
            None => Ok(None),
        }
    }

    fn create_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<bool> {
        let payload = self.encode(value)?;
        let reply: Option<String> = self.with_connection(|conn| {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(&payload).arg("NX");
            if let Some(ms) = ttl_millis(ttl) {
                cmd.arg("PX").arg(ms);
            }
            cmd.query(conn)
        })?;
        Ok(reply.is_some())
    }

    fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        let payload = self.encode(value)?;
        self.with_connection(|conn| {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(&payload);
            if let Some(ms) = ttl_millis(ttl) {
                cmd.arg("PX").arg(ms);
            }
            cmd.query::<()>(conn)
        })
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let removed: i64 = self.with_connection(|conn| redis::cmd("DEL").arg(key).query(conn))?;
        Ok(removed > 0)
    }

    fn increment(&self, key: &str) -> CacheResult<i64> {
        for attempt in 1..=self.max_increment_retries {
            let outcome = self.with_connection(|conn| {
                redis::cmd("WATCH").arg(key).query::<()>(conn)?;
                let current: Option<String> = redis::cmd("GET").arg(key).query(conn)?;
                if current.is_none() {
                    redis::cmd("UNWATCH").query::<()>(conn)?;
                    return Ok(IncrementOutcome::Missing);
                }
                // EXEC replies nil when the watched key changed.
                let committed: Option<(i64,)> =
                    redis::pipe().atomic().cmd("INCR").arg(key).query(conn)?;
                Ok(match committed {
                    Some((next,)) => IncrementOutcome::Done(next),
                    None => IncrementOutcome::Aborted,
                })
            })?;

            match outcome {
                IncrementOutcome::Done(next) => return Ok(next),
                IncrementOutcome::Missing => {
                    return Err(CacheError::NotFound {
                        key: key.to_string(),
                    })
                }
                IncrementOutcome::Aborted => {
                    debug!(key = %key, attempt, "increment transaction aborted, retrying");
                }
            }
        }

        Err(CacheError::ConflictExhausted {
            key: key.to_string(),
            attempts: self.max_increment_retries,
        })
    }

    fn increment_or_create(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        let next: i64 =
            self.with_connection(|conn| redis::cmd("INCRBY").arg(key).arg(delta).query(conn))?;
        if next == delta {
            if let Some(ms) = ttl_millis(ttl) {
                self.with_connection(|conn| {
                    redis::cmd("PEXPIRE").arg(key).arg(ms).query::<()>(conn)
                })?;
            }
        }
        Ok(next)
    }
}
