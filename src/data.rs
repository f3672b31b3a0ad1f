//! The persistence client: one SQLite pool and one cache, built once at
//! startup and released once at shutdown.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::cache::{self, Cache, MemoryCache, RedisCache, TracedCache};
use crate::config::{AppConfig, CacheBackend, CacheConfig};
use crate::db;

pub fn tag_key(id: i64) -> String {
    format!("tag:{}", id)
}

pub fn article_key(id: i64) -> String {
    format!("article:{}", id)
}

/// Shared handle to the database pool and the cache. Cloning is cheap.
#[derive(Clone)]
pub struct Data {
    db: SqlitePool,
    cache: Option<Arc<dyn Cache>>,
    ttl: Duration,
    /// Bumped by every eviction; fills started under an older value are dropped.
    epoch: Arc<AtomicU64>,
    /// Serializes epoch checks with evictions so a fill cannot land between
    /// an eviction's bump and its deletes.
    fill_lock: Arc<Mutex<()>>,
}

impl Data {
    /// Opens the pool and the cache client described by `cfg`.
    ///
    /// Schema migration is not part of this; see [`db::migrate`].
    pub async fn new(cfg: &AppConfig) -> anyhow::Result<(Self, Release)> {
        let cache = build_cache(&cfg.cache).map_err(|e| {
            tracing::error!("failed configuring cache: {:#}", e);
            e
        })?;
        let pool = db::connect(&cfg.database).await.map_err(|e| {
            tracing::error!("failed opening database: {:#}", e);
            e
        })?;
        tracing::info!(
            source = %cfg.database.source,
            cache = cache.as_ref().map(|c| c.backend()).unwrap_or("none"),
            "data resources ready"
        );

        let data = Self::from_parts(pool, cache, cfg.cache.ttl());
        let release = data.release();
        Ok((data, release))
    }

    pub fn from_parts(db: SqlitePool, cache: Option<Arc<dyn Cache>>, ttl: Duration) -> Self {
        Self { db, cache, ttl, epoch: Arc::new(AtomicU64::new(0)), fill_lock: Arc::new(Mutex::new(())) }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn cache(&self) -> Option<&dyn Cache> {
        self.cache.as_deref()
    }

    /// A [`Release`] closing this client's pool and cache.
    pub fn release(&self) -> Release {
        let mut closers: Vec<Box<dyn Closer>> = vec![Box::new(PoolCloser(self.db.clone()))];
        if let Some(cache) = &self.cache {
            closers.push(Box::new(CacheCloser(cache.clone())));
        }
        Release::new(closers)
    }

    /// Cached value for `key`, or `None` on miss, absent cache or cache failure.
    pub async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_deref()?;
        match cache::get_json(cache, key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, "cache read failed: {}", e);
                None
            }
        }
    }

    /// Current eviction epoch. Read it before loading a row that will be passed
    /// to [`Data::cache_fill`].
    pub fn cache_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Stores `value` under `key` unless an eviction happened since `epoch`.
    ///
    /// A reader that loaded a row before a concurrent write would otherwise
    /// republish the old row after the writer's eviction.
    pub async fn cache_fill<T: Serialize + Sync>(&self, key: &str, value: &T, epoch: u64) {
        let Some(cache) = self.cache.as_deref() else {
            return;
        };
        let _guard = self.fill_lock.lock().await;
        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!(key, "skipping cache fill after concurrent eviction");
            return;
        }
        if let Err(e) = cache::set_json(cache, key, value, Some(self.ttl)).await {
            tracing::warn!(key, "cache write failed: {}", e);
        }
    }

    pub async fn cache_evict(&self, keys: &[String]) {
        let Some(cache) = self.cache.as_deref() else {
            return;
        };
        let _guard = self.fill_lock.lock().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        for key in keys {
            if let Err(e) = cache.delete(key).await {
                tracing::warn!(key = %key, "cache eviction failed: {}", e);
            }
        }
    }
}

fn build_cache(cfg: &CacheConfig) -> anyhow::Result<Option<Arc<dyn Cache>>> {
    let cache: Option<Arc<dyn Cache>> = match cfg.backend {
        CacheBackend::Redis => Some(Arc::new(TracedCache::new(RedisCache::new(cfg)?))),
        CacheBackend::Memory => {
            let cap = NonZeroUsize::new(cfg.max_entries)
                .ok_or_else(|| anyhow::anyhow!("cache.max_entries must be > 0"))?;
            Some(Arc::new(TracedCache::new(MemoryCache::new(cap))))
        }
        CacheBackend::None => None,
    };
    Ok(cache)
}

/// One resource released at shutdown.
#[async_trait]
pub trait Closer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn close(&self) -> anyhow::Result<()>;
}

struct PoolCloser(SqlitePool);

#[async_trait]
impl Closer for PoolCloser {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn close(&self) -> anyhow::Result<()> {
        // Fold the WAL back into the main file; the pool is closed either way.
        let checkpoint = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);").execute(&self.0).await;
        self.0.close().await;
        checkpoint.map(|_| ()).map_err(|e| anyhow::anyhow!("wal checkpoint failed: {}", e))
    }
}

struct CacheCloser(Arc<dyn Cache>);

#[async_trait]
impl Closer for CacheCloser {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.0.close().await?;
        Ok(())
    }
}

/// Closes every resource it holds; one failure does not skip the others.
#[must_use = "call `run` at shutdown to release the data resources"]
pub struct Release {
    closers: Vec<Box<dyn Closer>>,
}

impl Release {
    pub fn new(closers: Vec<Box<dyn Closer>>) -> Self {
        Self { closers }
    }

    /// Closes all resources and returns how many failed.
    pub async fn run(self) -> usize {
        tracing::info!("closing the data resources");
        let mut failed = 0;
        for closer in &self.closers {
            if let Err(e) = closer.close().await {
                failed += 1;
                tracing::error!(resource = closer.name(), "close failed: {:#}", e);
            }
        }
        failed
    }
}
