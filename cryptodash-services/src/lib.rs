//! Data layer services for the crypto dashboard
//!
//! This crate turns the provider adapters into a resilient query surface:
//! priority-ordered fallback across providers, TTL caching, health tracking,
//! rate limiting, domain services, live feeds and the [`Dashboard`] facade
//! that wires them together.

pub mod blockchain_service;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod feed;
pub mod health;
pub mod market_service;
pub mod news_service;
pub mod orchestrator;
pub mod rate_limiter;
pub mod sentiment_service;
pub mod whale_service;

pub use blockchain_service::BlockchainService;
pub use cache::{CacheStats, ResponseCache};
pub use config::{CacheTtls, ConfigError, DashboardConfig, FeedConfig, WhaleConfig};
pub use dashboard::{Dashboard, HealthReport, MonitoringCallbacks};
pub use engine::{Endpoint, FallbackEngine, Sourced, DEFAULT_ATTEMPT_TIMEOUT};
pub use feed::{FeedError, FeedManager, SnapshotSource, SubscriptionId, WhaleWatcher};
pub use health::{AttemptRecord, HealthScope, HealthSummary, HealthTracker};
pub use market_service::MarketService;
pub use news_service::NewsService;
pub use orchestrator::Orchestrator;
pub use rate_limiter::{RateLimiterStats, RateLimiters, TokenBucket};
pub use sentiment_service::SentimentService;
pub use whale_service::WhaleService;
