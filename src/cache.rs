//! Cache backends.
//!
//! [`Cache`] is the seam; [`RedisCache`] and [`MemoryCache`] implement it and
//! [`TracedCache`] wraps either one so every operation shows up as a span.
//! Callers treat the cache as advisory: a failing cache never fails a request.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, IntoConnectionInfo};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::CacheConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
    #[error("cache payload could not be (de)serialized: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Operation(err.to_string())
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Short backend name, used as `db.system` on spans.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;

    /// Releases the underlying connection. Later calls may reconnect.
    async fn close(&self) -> CacheResult<()>;
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> CacheResult<Option<T>> {
    match cache.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> CacheResult<()> {
    let bytes = serde_json::to_vec(value)?;
    cache.set(key, &bytes, ttl).await
}

/// Redis backend over a lazily created [`ConnectionManager`].
///
/// The manager redials on its own after the server drops the connection, so a
/// Redis restart only costs the commands in flight at that moment.
pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
    dial_timeout: Duration,
    response_timeout: Duration,
}

impl RedisCache {
    /// Builds the client from `cfg`. No network I/O happens until the first command.
    pub fn new(cfg: &CacheConfig) -> CacheResult<Self> {
        let mut info = format!("redis://{}/{}", cfg.addr, cfg.db)
            .into_connection_info()
            .map_err(|e| CacheError::Connection(format!("invalid cache.addr {:?}: {}", cfg.addr, e)))?;
        if !cfg.password.is_empty() {
            info.redis.password = Some(cfg.password.clone());
        }
        let client = redis::Client::open(info).map_err(map_redis_error)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            dial_timeout: cfg.dial_timeout(),
            response_timeout: cfg.response_timeout(),
        })
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        // A failed first dial leaves the slot empty; the next command dials again.
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(self.dial_timeout)
            .set_response_timeout(self.response_timeout)
            .set_number_of_retries(0);
        let conn = ConnectionManager::new_with_config(self.client.clone(), config)
            .await
            .map_err(map_redis_error)?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await.map_err(map_redis_error)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(map_redis_error)?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        let taken = self.conn.lock().await.take();
        if let Some(mut conn) = taken {
            let _: () = redis::cmd("QUIT").query_async(&mut conn).await.map_err(map_redis_error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// In-process backend with LRU eviction and lazy TTL expiry.
pub struct MemoryCache {
    store: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self { store: Mutex::new(LruCache::new(max_entries)) }
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut store = self.store.lock().await;
        let expired = match store.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            store.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let entry = CacheEntry { value: value.to_vec(), expires_at: ttl.map(|d| Instant::now() + d) };
        self.store.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.lock().await.pop(key);
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        self.store.lock().await.clear();
        Ok(())
    }
}

/// Emits one span per cache operation on top of any backend.
pub struct TracedCache<C> {
    inner: C,
}

impl<C: Cache> TracedCache<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

macro_rules! cache_span {
    ($self:ident, $op:literal, $key:expr) => {
        tracing::debug_span!(
            "cache",
            db.system = $self.inner.backend(),
            db.operation = $op,
            cache.key = $key,
            otel.kind = "client"
        )
    };
}

#[async_trait]
impl<C: Cache> Cache for TracedCache<C> {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let span = cache_span!(self, "GET", key);
        let res = self.inner.get(key).instrument(span.clone()).await;
        span.in_scope(|| match &res {
            Ok(Some(_)) => tracing::trace!("hit"),
            Ok(None) => tracing::trace!("miss"),
            Err(e) => tracing::debug!(error = %e, "failed"),
        });
        res
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.inner.set(key, value, ttl).instrument(cache_span!(self, "SET", key)).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.delete(key).instrument(cache_span!(self, "DEL", key)).await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.inner.ping().instrument(cache_span!(self, "PING", "")).await
    }

    async fn close(&self) -> CacheResult<()> {
        self.inner.close().instrument(cache_span!(self, "QUIT", "")).await
    }
}
