//! TTL response cache
//!
//! Sits in front of the fallback engine, one entry per logical query key.
//! Values are stored type-erased and handed back as clones. Only successful
//! results are stored, and the lock is never held while a producer runs, so
//! two concurrent misses on one key may both reach upstream.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Query-type TTLs
pub const PRICE_TTL: Duration = Duration::from_secs(60);
pub const HISTORY_TTL: Duration = Duration::from_secs(60);
pub const NEWS_TTL: Duration = Duration::from_secs(5 * 60);
pub const SENTIMENT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// Cache usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Keyed TTL store shared by the domain services
///
/// Keys name a logical query (`prices:BTC,ETH`, `news:latest`), never a
/// provider, so a value cached from one provider answers later calls no
/// matter which provider would be tried next.
///
/// ## Expiry
///
/// The TTL travels with each entry. An entry older than its TTL reads as
/// absent until a fresh value overwrites it or
/// [`purge_expired`](Self::purge_expired) removes it. Time comes from
/// `tokio::time`, so paused-clock tests can step past a TTL exactly.
///
/// ## Failures
///
/// [`get_or_fetch`](Self::get_or_fetch) stores only `Ok` values. An error
/// passes straight through and the next call goes upstream again.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value for `key`, if one of type `T` is stored
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let entries = self.entries.lock();
        let entry = entries.get(key).filter(|e| !e.is_expired(now))?;
        entry.value.downcast_ref::<T>().cloned()
    }

    pub fn insert<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value),
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Serve `key` from cache, or run `producer` and store a successful result
    ///
    /// A zero `ttl` bypasses the cache entirely.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if ttl.is_zero() {
            return producer().await;
        }

        if let Some(value) = self.get::<T>(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("[Cache] HIT {}", key);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("[Cache] MISS {}", key);

        let value = producer().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("stats", &self.stats())
            .finish()
    }
}
