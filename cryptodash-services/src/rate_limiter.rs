//! Per-provider rate limiting
//!
//! Each provider with a configured [`RateLimit`] gets a token bucket. The
//! engine consults it before every attempt and never waits: an empty bucket
//! fails the attempt so the next provider in the chain can be tried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use cryptodash_core::{ProviderConfig, RateLimit};
use cryptodash_providers::ProviderRegistry;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket that refills continuously up to its burst capacity
#[derive(Debug)]
pub struct TokenBucket {
    name: String,
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl TokenBucket {
    /// Starts full: `limit.requests` may be spent immediately
    pub fn new(name: &str, limit: RateLimit) -> Self {
        let capacity = f64::from(limit.requests.max(1));
        let per_secs = limit.per.as_secs_f64().max(f64::EPSILON);
        Self {
            name: name.to_string(),
            capacity,
            refill_per_sec: capacity / per_secs,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            total_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            self.rejected_requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                "[RATE_LIMITER:{}] REJECTED - {:.2} tokens left",
                self.name, state.tokens
            );
            false
        }
    }

    /// Tokens currently available
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            name: self.name.clone(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            capacity: self.capacity as u32,
            available: self.available(),
        }
    }
}

/// Statistics about rate limiter usage
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub name: String,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub capacity: u32,
    pub available: f64,
}

/// Buckets for every rate-limited provider, keyed by provider name
#[derive(Debug, Default)]
pub struct RateLimiters {
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// One bucket per distinct provider that declares a limit
    pub fn from_registry(registry: &ProviderRegistry) -> Self {
        let limiters = Self::new();
        for provider in registry.all_providers() {
            if let Some(limit) = provider.rate_limit {
                limiters
                    .buckets
                    .insert(provider.name.clone(), Arc::new(TokenBucket::new(&provider.name, limit)));
            }
        }
        limiters
    }

    /// Whether `provider` may be called now; unlimited providers always may
    pub fn try_acquire(&self, provider: &ProviderConfig) -> bool {
        let Some(limit) = provider.rate_limit else {
            return true;
        };
        let bucket = self
            .buckets
            .entry(provider.name.clone())
            .or_insert_with(|| Arc::new(TokenBucket::new(&provider.name, limit)))
            .clone();
        bucket.try_acquire()
    }

    pub fn stats(&self) -> Vec<RateLimiterStats> {
        let mut stats: Vec<RateLimiterStats> =
            self.buckets.iter().map(|entry| entry.value().stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptodash_core::ProviderId;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let bucket = TokenBucket::new("test", RateLimit::per_second(2));

        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        let stats = bucket.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.rejected_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let bucket = TokenBucket::new("test", RateLimit::per_minute(60));
        for _ in 0..60 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_capacity() {
        let bucket = TokenBucket::new("test", RateLimit::per_second(3));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!((bucket.available() - 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_provider_always_allowed() {
        let limiters = RateLimiters::new();
        let provider = ProviderConfig::new(ProviderId::Binance, "https://x.test", 1);
        for _ in 0..1000 {
            assert!(limiters.try_acquire(&provider));
        }
        assert!(limiters.stats().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_shared_by_name() {
        let registry = ProviderRegistry::new().with(
            cryptodash_core::Capability::News,
            ProviderConfig::new(ProviderId::CryptoCompare, "https://x.test", 1)
                .with_rate_limit(RateLimit::per_minute(1)),
        );
        let limiters = RateLimiters::from_registry(&registry);
        let provider = &registry.providers(cryptodash_core::Capability::News)[0];

        assert!(limiters.try_acquire(provider));
        // same provider used for another capability draws from the same bucket
        let same = provider.clone().with_priority(5);
        assert!(!limiters.try_acquire(&same));
    }
}
