//! Composite queries
//!
//! Each aggregate fans its parts out concurrently and waits for all of them.
//! A part that fails is replaced by its neutral default and named in the
//! aggregate's `degraded` list; the aggregate itself never fails.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use cryptodash_core::{
    CompleteAssetData, FearGreedIndex, FetchResult, MarketOverview, NewsAndSentiment,
    SentimentData, TopMovers,
};

use crate::market_service::MarketService;
use crate::news_service::NewsService;
use crate::sentiment_service::SentimentService;

/// Gainers and losers shown on the overview
pub const OVERVIEW_MOVERS: usize = 5;
/// Headlines shown on the overview and asset pages
pub const OVERVIEW_NEWS: usize = 10;

pub struct Orchestrator {
    market: Arc<MarketService>,
    news: Arc<NewsService>,
    sentiment: Arc<SentimentService>,
}

/// Unwrap `result`, or record `field` as degraded and use the default
fn settle<T>(
    result: FetchResult<T>,
    field: &str,
    degraded: &mut Vec<String>,
    default: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("[Orchestrator] {} fell back to default: {}", field, e);
            degraded.push(field.to_string());
            default()
        }
    }
}

impl Orchestrator {
    pub fn new(
        market: Arc<MarketService>,
        news: Arc<NewsService>,
        sentiment: Arc<SentimentService>,
    ) -> Self {
        Self {
            market,
            news,
            sentiment,
        }
    }

    /// Quotes, fear & greed, movers, trending coins and headlines
    #[instrument(skip(self))]
    pub async fn get_market_overview(&self, symbols: &[String]) -> MarketOverview {
        let (prices, fear_greed, movers, trending, news) = tokio::join!(
            self.market.try_current_prices(symbols),
            self.sentiment.try_fear_greed(),
            self.market.try_top_movers(OVERVIEW_MOVERS),
            self.market.try_trending(),
            self.news.try_latest_news(OVERVIEW_NEWS),
        );

        let mut degraded = Vec::new();
        let overview = MarketOverview {
            prices: settle(prices, "prices", &mut degraded, Vec::new),
            sentiment: settle(fear_greed, "sentiment", &mut degraded, FearGreedIndex::neutral),
            top_movers: settle(movers, "top_movers", &mut degraded, TopMovers::default),
            trending: settle(trending, "trending", &mut degraded, Vec::new),
            news: settle(news, "news", &mut degraded, Vec::new),
            degraded,
            generated_at: Utc::now(),
        };

        debug!(
            "[Orchestrator] Overview: {} price(s), degraded {:?}",
            overview.prices.len(),
            overview.degraded
        );
        overview
    }

    /// Quote, `days` of history, sentiment and headlines for one asset
    #[instrument(skip(self))]
    pub async fn get_complete_asset_data(&self, symbol: &str, days: u32) -> CompleteAssetData {
        let symbol = symbol.trim().to_uppercase();
        let request = [symbol.clone()];

        let (quote, history, sentiment, news) = tokio::join!(
            self.market.try_current_prices(&request),
            self.market.try_historical_data(&symbol, days),
            self.sentiment.try_sentiment(&symbol),
            self.news.try_news_for_symbol(&symbol, OVERVIEW_NEWS),
        );

        let mut degraded = Vec::new();
        let market = settle(quote, "market", &mut degraded, Vec::new)
            .into_iter()
            .find(|q| q.symbol == symbol);
        if market.is_none() && !degraded.iter().any(|f| f == "market") {
            degraded.push("market".to_string());
        }
        let history = settle(history, "history", &mut degraded, Vec::new);
        let sentiment = settle(sentiment, "sentiment", &mut degraded, || {
            SentimentData::neutral(symbol.clone())
        });
        let news = settle(news, "news", &mut degraded, Vec::new);

        CompleteAssetData {
            symbol,
            market,
            history,
            sentiment,
            news,
            degraded,
            generated_at: Utc::now(),
        }
    }

    /// Headlines for `symbol` with its composite sentiment and fear & greed
    #[instrument(skip(self))]
    pub async fn get_news_and_sentiment(&self, symbol: &str, limit: usize) -> NewsAndSentiment {
        let symbol = symbol.trim().to_uppercase();

        let (news, sentiment, fear_greed) = tokio::join!(
            self.news.try_news_for_symbol(&symbol, limit),
            self.sentiment.try_sentiment(&symbol),
            self.sentiment.try_fear_greed(),
        );

        let mut degraded = Vec::new();
        NewsAndSentiment {
            news: settle(news, "news", &mut degraded, Vec::new),
            sentiment: settle(sentiment, "sentiment", &mut degraded, || {
                SentimentData::neutral(symbol.clone())
            }),
            fear_greed: settle(fear_greed, "fear_greed", &mut degraded, FearGreedIndex::neutral),
            degraded,
            generated_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish()
    }
}
