//! Core types for the crypto dashboard data layer
//!
//! This crate defines the shared data structures used across the dashboard:
//! provider configuration, canonical market/news/sentiment/whale shapes,
//! aggregate query results, live feed events and the error taxonomy.

pub mod aggregate;
pub mod capability;
pub mod error;
pub mod feed;
pub mod market;
pub mod news;
pub mod provider;
pub mod sentiment;
pub mod whale;

pub use aggregate::{CompleteAssetData, MarketOverview, NewsAndSentiment};
pub use capability::Capability;
pub use error::{FetchError, FetchResult, ProviderError};
pub use feed::{FeedState, PriceTick, TickOrigin};
pub use market::{AddressBalance, MarketData, PricePoint, TopMovers, TrendingCoin};
pub use news::NewsArticle;
pub use provider::{ProviderAuth, ProviderConfig, ProviderId, RateLimit};
pub use sentiment::{FearGreedIndex, SentimentData, SentimentLabel, NEUTRAL_SCORE};
pub use whale::WhaleTransaction;
