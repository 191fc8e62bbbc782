//! Dashboard facade
//!
//! A [`Dashboard`] owns one complete, isolated data layer: cache, health
//! tracker, rate limiters, engine, domain services and live feeds. Nothing
//! is global, so several instances can coexist.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use cryptodash_core::{
    AddressBalance, Capability, CompleteAssetData, FearGreedIndex, FeedState, FetchResult,
    MarketData, MarketOverview, NewsAndSentiment, NewsArticle, PricePoint, PriceTick,
    ProviderError, SentimentData, TopMovers, TrendingCoin, WhaleTransaction,
};
use cryptodash_providers::{
    CoinCapStream, HttpTransport, PriceStream, ProviderRegistry, ReqwestTransport, SymbolMap,
};

use crate::blockchain_service::BlockchainService;
use crate::cache::{CacheStats, ResponseCache};
use crate::config::DashboardConfig;
use crate::engine::FallbackEngine;
use crate::feed::{Callback, FeedError, FeedManager, SubscriptionId, WhaleWatcher};
use crate::health::{HealthSummary, HealthTracker};
use crate::market_service::MarketService;
use crate::news_service::NewsService;
use crate::orchestrator::Orchestrator;
use crate::rate_limiter::{RateLimiterStats, RateLimiters};
use crate::sentiment_service::SentimentService;
use crate::whale_service::WhaleService;

/// Callbacks for [`Dashboard::start_real_time_monitoring`]
#[derive(Default)]
pub struct MonitoringCallbacks {
    on_price: Option<Callback<PriceTick>>,
    on_whale: Option<Callback<WhaleTransaction>>,
}

impl MonitoringCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_price<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PriceTick) + Send + Sync + 'static,
    {
        self.on_price = Some(Arc::new(callback));
        self
    }

    /// Also starts whale polling
    pub fn on_whale<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WhaleTransaction) + Send + Sync + 'static,
    {
        self.on_whale = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for MonitoringCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringCallbacks")
            .field("on_price", &self.on_price.is_some())
            .field("on_whale", &self.on_whale.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Monitoring {
    price: Option<SubscriptionId>,
    whale: Option<SubscriptionId>,
}

/// Point-in-time view of provider health and internal state
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub providers: BTreeMap<String, HealthSummary>,
    pub capabilities: BTreeMap<Capability, HealthSummary>,
    /// Configured provider names per capability, in fallback order
    pub chains: BTreeMap<Capability, Vec<String>>,
    pub feed: FeedState,
    pub cache: CacheStats,
    pub rate_limiters: Vec<RateLimiterStats>,
    pub generated_at: DateTime<Utc>,
}

pub struct Dashboard {
    config: DashboardConfig,
    cache: Arc<ResponseCache>,
    health: Arc<HealthTracker>,
    limiters: Arc<RateLimiters>,
    engine: Arc<FallbackEngine>,
    market: Arc<MarketService>,
    news: Arc<NewsService>,
    sentiment: Arc<SentimentService>,
    whales: Arc<WhaleService>,
    blockchain: BlockchainService,
    orchestrator: Orchestrator,
    feed: FeedManager,
    whale_watcher: WhaleWatcher,
    monitoring: Mutex<Monitoring>,
}

impl Dashboard {
    /// Production wiring: default provider roster, reqwest, CoinCap stream
    pub fn new(config: DashboardConfig) -> Result<Self, ProviderError> {
        let registry = ProviderRegistry::with_defaults(&config.keys);
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_parts(
            config,
            registry,
            transport,
            Arc::new(CoinCapStream::new()),
        ))
    }

    pub fn with_parts(
        config: DashboardConfig,
        registry: ProviderRegistry,
        transport: Arc<dyn HttpTransport>,
        stream: Arc<dyn PriceStream>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new());
        let health = Arc::new(HealthTracker::new(config.health_capacity));
        let limiters = Arc::new(RateLimiters::from_registry(&registry));
        let engine = Arc::new(FallbackEngine::new(
            Arc::new(registry),
            transport,
            Arc::clone(&health),
            Arc::clone(&limiters),
            config.attempt_timeout,
        ));
        let symbols = Arc::new(SymbolMap::default());
        let ttls = config.ttls;

        let market = Arc::new(MarketService::new(
            Arc::clone(&engine),
            Arc::clone(&cache),
            Arc::clone(&symbols),
            ttls,
        ));
        let news = Arc::new(NewsService::new(
            Arc::clone(&engine),
            Arc::clone(&cache),
            Arc::clone(&symbols),
            ttls,
        ));
        let sentiment = Arc::new(SentimentService::new(
            Arc::clone(&engine),
            Arc::clone(&cache),
            Arc::clone(&symbols),
            ttls,
        ));
        let whales = Arc::new(WhaleService::new(
            Arc::clone(&engine),
            config.whale.min_value_usd,
        ));
        let blockchain = BlockchainService::new(Arc::clone(&engine), Arc::clone(&cache), ttls);
        let orchestrator = Orchestrator::new(
            Arc::clone(&market),
            Arc::clone(&news),
            Arc::clone(&sentiment),
        );
        let feed = FeedManager::new(stream, market.clone(), symbols, config.feed);
        let whale_watcher = WhaleWatcher::new(Arc::clone(&whales), config.whale);

        info!(
            "Dashboard initialized ({} provider(s), watchlist {:?})",
            engine.registry().all_providers().len(),
            config.watchlist
        );

        Self {
            config,
            cache,
            health,
            limiters,
            engine,
            market,
            news,
            sentiment,
            whales,
            blockchain,
            orchestrator,
            feed,
            whale_watcher,
            monitoring: Mutex::new(Monitoring::default()),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn engine(&self) -> &FallbackEngine {
        &self.engine
    }

    pub fn market(&self) -> &MarketService {
        &self.market
    }

    pub fn news(&self) -> &NewsService {
        &self.news
    }

    pub fn sentiment(&self) -> &SentimentService {
        &self.sentiment
    }

    pub fn feed(&self) -> &FeedManager {
        &self.feed
    }

    pub fn whale_watcher(&self) -> &WhaleWatcher {
        &self.whale_watcher
    }

    // Query surface

    pub async fn get_current_prices(&self, symbols: &[String]) -> Vec<MarketData> {
        self.market.get_current_prices(symbols).await
    }

    pub async fn get_historical_data(&self, symbol: &str, days: u32) -> Vec<PricePoint> {
        self.market.get_historical_data(symbol, days).await
    }

    pub async fn get_top_movers(&self, limit: usize) -> TopMovers {
        self.market.get_top_movers(limit).await
    }

    pub async fn get_trending(&self) -> Vec<TrendingCoin> {
        self.market.get_trending().await
    }

    pub async fn get_latest_news(&self, limit: usize) -> Vec<NewsArticle> {
        self.news.get_latest_news(limit).await
    }

    pub async fn search_news(
        &self,
        query: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<NewsArticle> {
        self.news.search_news(query, from, to, limit).await
    }

    /// Like [`search_news`](Self::search_news), but tells "no data" from "no matches"
    pub async fn try_search_news(
        &self,
        query: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> FetchResult<Vec<NewsArticle>> {
        self.news.try_search_news(query, from, to, limit).await
    }

    pub async fn get_sentiment(&self, symbol: &str) -> SentimentData {
        self.sentiment.get_sentiment(symbol).await
    }

    pub async fn get_fear_greed(&self) -> FearGreedIndex {
        self.sentiment.get_fear_greed().await
    }

    pub async fn get_whale_transactions(&self, since: DateTime<Utc>) -> Vec<WhaleTransaction> {
        self.whales.get_recent_transactions(since).await
    }

    pub async fn get_address_balance(&self, chain: &str, address: &str) -> Option<AddressBalance> {
        self.blockchain.get_address_balance(chain, address).await
    }

    pub async fn get_market_overview(&self, symbols: &[String]) -> MarketOverview {
        let symbols = if symbols.is_empty() {
            &self.config.watchlist
        } else {
            symbols
        };
        self.orchestrator.get_market_overview(symbols).await
    }

    pub async fn get_complete_asset_data(&self, symbol: &str, days: u32) -> CompleteAssetData {
        self.orchestrator.get_complete_asset_data(symbol, days).await
    }

    pub async fn get_news_and_sentiment(&self, symbol: &str, limit: usize) -> NewsAndSentiment {
        self.orchestrator.get_news_and_sentiment(symbol, limit).await
    }

    // Live updates

    /// Stream the watchlist to `callbacks` until stopped
    pub fn start_real_time_monitoring(
        &self,
        callbacks: MonitoringCallbacks,
    ) -> Result<(), FeedError> {
        if self.feed.is_running() {
            return Err(FeedError::AlreadyRunning);
        }

        let mut monitoring = self.monitoring.lock();
        if let Some(on_price) = callbacks.on_price {
            monitoring.price = Some(self.feed.subscribe_arc(&[], on_price));
        }
        if let Err(e) = self.feed.start(&self.config.watchlist) {
            if let Some(id) = monitoring.price.take() {
                self.feed.unsubscribe(id);
            }
            return Err(e);
        }

        if let Some(on_whale) = callbacks.on_whale {
            monitoring.whale = Some(self.whale_watcher.subscribe_arc(&[], on_whale));
            if let Err(e) = self.whale_watcher.start() {
                self.feed.halt();
                if let Some(id) = monitoring.whale.take() {
                    self.whale_watcher.unsubscribe(id);
                }
                if let Some(id) = monitoring.price.take() {
                    self.feed.unsubscribe(id);
                }
                return Err(e);
            }
        }

        info!("Real-time monitoring started");
        Ok(())
    }

    /// Stop both feeds and drop the monitoring callbacks
    pub async fn stop_real_time_monitoring(&self) {
        self.feed.stop().await;
        self.whale_watcher.stop().await;

        let monitoring = std::mem::take(&mut *self.monitoring.lock());
        if let Some(id) = monitoring.price {
            self.feed.unsubscribe(id);
        }
        if let Some(id) = monitoring.whale {
            self.whale_watcher.unsubscribe(id);
        }
        info!("Real-time monitoring stopped");
    }

    pub fn health_report(&self) -> HealthReport {
        let registry = self.engine.registry();
        let chains: BTreeMap<Capability, Vec<String>> = Capability::ALL
            .into_iter()
            .map(|c| {
                let names = registry
                    .providers(c)
                    .iter()
                    .map(|p| p.name.clone())
                    .collect();
                (c, names)
            })
            .collect();

        HealthReport {
            providers: self.health.provider_summaries(),
            capabilities: self.health.capability_summaries(),
            chains,
            feed: self.feed.state(),
            cache: self.cache.stats(),
            rate_limiters: self.limiters.stats(),
            generated_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("watchlist", &self.config.watchlist)
            .field("feed", &self.feed.state())
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}
