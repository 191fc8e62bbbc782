//! Composite query results
//!
//! Each aggregate is assembled from independently fetched parts. A part
//! that could not be fetched holds its neutral default and its field name
//! is listed in `degraded`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    FearGreedIndex, MarketData, NewsArticle, PricePoint, SentimentData, TopMovers, TrendingCoin,
};

/// Dashboard landing view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub prices: Vec<MarketData>,
    pub sentiment: FearGreedIndex,
    pub top_movers: TopMovers,
    pub trending: Vec<TrendingCoin>,
    pub news: Vec<NewsArticle>,
    pub degraded: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Everything known about one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteAssetData {
    pub symbol: String,
    /// `None` when no price provider answered
    pub market: Option<MarketData>,
    pub history: Vec<PricePoint>,
    pub sentiment: SentimentData,
    pub news: Vec<NewsArticle>,
    pub degraded: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// News feed paired with sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsAndSentiment {
    pub news: Vec<NewsArticle>,
    pub sentiment: SentimentData,
    pub fear_greed: FearGreedIndex,
    pub degraded: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl MarketOverview {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

impl CompleteAssetData {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

impl NewsAndSentiment {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
