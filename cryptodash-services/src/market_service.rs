//! Market data service
//!
//! Spot quotes, price history, top movers and trending coins over the
//! market data chain. Quote requests first try the rich `markets` shape and
//! fall back to the price-only shape when every provider fails it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use cryptodash_core::{
    Capability, FetchError, FetchResult, MarketData, PricePoint, ProviderId, TopMovers,
    TrendingCoin,
};
use cryptodash_providers::{binance, coincap, coingecko, cryptocompare, AssetInfo, SymbolMap};

use crate::cache::ResponseCache;
use crate::config::CacheTtls;
use crate::engine::{non_empty, unsupported, Endpoint, FallbackEngine};

/// Rows requested when ranking movers
const MOVERS_UNIVERSE: usize = 100;

pub struct MarketService {
    engine: Arc<FallbackEngine>,
    cache: Arc<ResponseCache>,
    symbols: Arc<SymbolMap>,
    ttls: CacheTtls,
}

impl MarketService {
    pub fn new(
        engine: Arc<FallbackEngine>,
        cache: Arc<ResponseCache>,
        symbols: Arc<SymbolMap>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            engine,
            cache,
            symbols,
            ttls,
        }
    }

    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    /// Quotes for `symbols`, or an empty list when no provider answers
    #[instrument(skip(self))]
    pub async fn get_current_prices(&self, symbols: &[String]) -> Vec<MarketData> {
        self.try_current_prices(symbols).await.unwrap_or_else(|e| {
            warn!("[MarketService] No quotes for {:?}: {}", symbols, e);
            Vec::new()
        })
    }

    /// Cached quotes, in request order
    pub async fn try_current_prices(&self, symbols: &[String]) -> FetchResult<Vec<MarketData>> {
        let assets = self.resolve(symbols)?;
        let key = format!("prices:{}", joined(&assets));
        self.cache
            .get_or_fetch(&key, self.ttls.prices, || self.fetch_quotes(assets.clone()))
            .await
    }

    /// Uncached quotes, used by the live feed's polling fallback
    pub async fn fetch_current_prices(&self, symbols: &[String]) -> FetchResult<Vec<MarketData>> {
        let assets = self.resolve(symbols)?;
        self.fetch_quotes(assets).await
    }

    /// Price series for the last `days` days, or an empty list
    #[instrument(skip(self))]
    pub async fn get_historical_data(&self, symbol: &str, days: u32) -> Vec<PricePoint> {
        self.try_historical_data(symbol, days)
            .await
            .unwrap_or_else(|e| {
                warn!("[MarketService] No history for {}: {}", symbol, e);
                Vec::new()
            })
    }

    pub async fn try_historical_data(
        &self,
        symbol: &str,
        days: u32,
    ) -> FetchResult<Vec<PricePoint>> {
        if symbol.trim().is_empty() {
            return Err(FetchError::invalid_query("empty symbol"));
        }
        let asset = Arc::new(self.symbols.resolve(symbol));
        let days = days.max(1);
        let key = format!("history:{}:{}", asset.symbol, days);

        self.cache
            .get_or_fetch(&key, self.ttls.history, || async {
                let sourced = self
                    .engine
                    .execute(Capability::MarketData, &history_endpoint(asset.clone(), days))
                    .await?;
                Ok::<_, FetchError>(sourced.value)
            })
            .await
    }

    /// Largest gainers and losers among the top assets by market cap
    #[instrument(skip(self))]
    pub async fn get_top_movers(&self, limit: usize) -> TopMovers {
        self.try_top_movers(limit).await.unwrap_or_else(|e| {
            warn!("[MarketService] No movers: {}", e);
            TopMovers::default()
        })
    }

    pub async fn try_top_movers(&self, limit: usize) -> FetchResult<TopMovers> {
        let key = format!("movers:{}", limit);
        self.cache
            .get_or_fetch(&key, self.ttls.prices, || async {
                let sourced = self
                    .engine
                    .execute(Capability::MarketData, &top_markets_endpoint())
                    .await?;
                Ok::<_, FetchError>(TopMovers::from_quotes(sourced.value, limit))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_trending(&self) -> Vec<TrendingCoin> {
        self.try_trending().await.unwrap_or_else(|e| {
            warn!("[MarketService] No trending coins: {}", e);
            Vec::new()
        })
    }

    pub async fn try_trending(&self) -> FetchResult<Vec<TrendingCoin>> {
        self.cache
            .get_or_fetch("trending", self.ttls.prices, || async {
                let sourced = self
                    .engine
                    .execute(Capability::MarketData, &trending_endpoint())
                    .await?;
                Ok::<_, FetchError>(sourced.value)
            })
            .await
    }

    fn resolve(&self, symbols: &[String]) -> FetchResult<Arc<Vec<AssetInfo>>> {
        let assets = self.symbols.resolve_all(symbols);
        if assets.is_empty() {
            return Err(FetchError::invalid_query("no symbols requested"));
        }
        Ok(Arc::new(assets))
    }

    async fn fetch_quotes(&self, assets: Arc<Vec<AssetInfo>>) -> FetchResult<Vec<MarketData>> {
        let shapes = [
            markets_endpoint(assets.clone()),
            simple_price_endpoint(assets.clone()),
        ];
        let sourced = self
            .engine
            .execute_shapes(Capability::MarketData, &shapes)
            .await?;
        info!(
            "[MarketService] {} quote(s) for {} from {}",
            sourced.value.len(),
            joined(&assets),
            sourced.provider
        );
        Ok(in_request_order(sourced.value, &assets))
    }
}

impl std::fmt::Debug for MarketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketService")
            .field("symbols", &self.symbols.len())
            .field("ttls", &self.ttls)
            .finish()
    }
}

fn joined(assets: &[AssetInfo]) -> String {
    assets
        .iter()
        .map(|a| a.symbol.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn in_request_order(mut quotes: Vec<MarketData>, assets: &[AssetInfo]) -> Vec<MarketData> {
    quotes.sort_by_key(|q| {
        assets
            .iter()
            .position(|a| a.symbol == q.symbol)
            .unwrap_or(usize::MAX)
    });
    quotes
}

fn markets_endpoint(assets: Arc<Vec<AssetInfo>>) -> Endpoint<Vec<MarketData>> {
    let request_assets = assets.clone();
    Endpoint::new(
        "markets",
        move |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::markets_request(&request_assets)),
            ProviderId::CoinCap => Some(coincap::assets_request(&request_assets)),
            ProviderId::CryptoCompare => {
                Some(cryptocompare::full_prices_request(&request_assets))
            }
            ProviderId::Binance => Some(binance::ticker_24h_request(&request_assets)),
            _ => None,
        },
        move |provider, body| {
            let quotes = match provider.id {
                ProviderId::CoinGecko => coingecko::parse_markets(body, &assets, &provider.name)?,
                ProviderId::CoinCap => coincap::parse_assets(body, &assets, &provider.name)?,
                ProviderId::CryptoCompare => {
                    cryptocompare::parse_full_prices(body, &assets, &provider.name)?
                }
                ProviderId::Binance => binance::parse_ticker_24h(body, &assets, &provider.name)?,
                other => return Err(unsupported(other, "market quotes")),
            };
            non_empty(quotes, "market quotes")
        },
    )
}

fn simple_price_endpoint(assets: Arc<Vec<AssetInfo>>) -> Endpoint<Vec<MarketData>> {
    let request_assets = assets.clone();
    Endpoint::new(
        "simple-price",
        move |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::simple_price_request(&request_assets)),
            ProviderId::CryptoCompare => {
                Some(cryptocompare::simple_prices_request(&request_assets))
            }
            _ => None,
        },
        move |provider, body| {
            let quotes = match provider.id {
                ProviderId::CoinGecko => {
                    coingecko::parse_simple_price(body, &assets, &provider.name)?
                }
                ProviderId::CryptoCompare => {
                    cryptocompare::parse_simple_prices(body, &assets, &provider.name)?
                }
                other => return Err(unsupported(other, "simple prices")),
            };
            non_empty(quotes, "prices")
        },
    )
}

fn history_endpoint(asset: Arc<AssetInfo>, days: u32) -> Endpoint<Vec<PricePoint>> {
    let request_asset = asset.clone();
    Endpoint::new(
        "history",
        move |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::market_chart_request(&request_asset, days)),
            ProviderId::CoinCap => {
                Some(coincap::history_request(&request_asset, days, Utc::now()))
            }
            ProviderId::CryptoCompare => {
                Some(cryptocompare::histoday_request(&request_asset, days))
            }
            ProviderId::Binance => Some(binance::klines_request(&request_asset, days)),
            _ => None,
        },
        move |provider, body| {
            let points = match provider.id {
                ProviderId::CoinGecko => coingecko::parse_market_chart(body)?,
                ProviderId::CoinCap => coincap::parse_history(body)?,
                ProviderId::CryptoCompare => cryptocompare::parse_histoday(body)?,
                ProviderId::Binance => binance::parse_klines(body)?,
                other => return Err(unsupported(other, "price history")),
            };
            non_empty(points, &format!("{} price points", asset.symbol))
        },
    )
}

fn top_markets_endpoint() -> Endpoint<Vec<MarketData>> {
    Endpoint::new(
        "top-markets",
        |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::top_markets_request(MOVERS_UNIVERSE)),
            ProviderId::CoinCap => Some(coincap::top_assets_request(MOVERS_UNIVERSE)),
            _ => None,
        },
        |provider, body| {
            let quotes = match provider.id {
                ProviderId::CoinGecko => coingecko::parse_markets(body, &[], &provider.name)?,
                ProviderId::CoinCap => coincap::parse_assets(body, &[], &provider.name)?,
                other => return Err(unsupported(other, "market rankings")),
            };
            non_empty(quotes, "ranked markets")
        },
    )
}

fn trending_endpoint() -> Endpoint<Vec<TrendingCoin>> {
    Endpoint::new(
        "trending",
        |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::trending_request()),
            _ => None,
        },
        |provider, body| match provider.id {
            ProviderId::CoinGecko => coingecko::parse_trending(body),
            other => Err(unsupported(other, "trending coins")),
        },
    )
}
