//! CoinGecko adapter
//!
//! Market data (`/coins/markets`, `/simple/price`, `/coins/{id}/market_chart`,
//! `/search/trending`) and community sentiment (`/coins/{id}`).

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{MarketData, PricePoint, ProviderError, TrendingCoin};

use crate::convert::{from_body, from_unix_millis, parse_timestamp};
use crate::request::RequestTemplate;
use crate::symbols::AssetInfo;

#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<Decimal>,
    price_change_24h: Option<Decimal>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<Decimal>,
    market_cap: Option<Decimal>,
    high_24h: Option<Decimal>,
    low_24h: Option<Decimal>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<Decimal>,
    usd_24h_change: Option<f64>,
    usd_24h_vol: Option<Decimal>,
    usd_market_cap: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, Decimal)>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
    symbol: String,
    name: String,
    market_cap_rank: Option<u32>,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    sentiment_votes_up_percentage: Option<f64>,
    community_data: Option<CommunityData>,
}

#[derive(Debug, Deserialize)]
struct CommunityData {
    twitter_followers: Option<u64>,
    reddit_subscribers: Option<u64>,
}

/// Community inputs for the sentiment composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommunityStats {
    /// Share of up votes, 0-100
    pub up_votes_percentage: Option<f64>,
    /// Twitter followers plus Reddit subscribers
    pub followers: Option<u64>,
}

fn ids(assets: &[AssetInfo]) -> String {
    assets
        .iter()
        .map(|a| a.coingecko_id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn asset_by_id<'a>(assets: &'a [AssetInfo], id: &str) -> Option<&'a AssetInfo> {
    assets.iter().find(|a| a.coingecko_id == id)
}

pub fn markets_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/coins/markets")
        .query("vs_currency", "usd")
        .query("ids", ids(assets))
        .query("price_change_percentage", "24h")
}

/// Top coins by market cap, used to rank movers
pub fn top_markets_request(per_page: usize) -> RequestTemplate {
    RequestTemplate::new("/coins/markets")
        .query("vs_currency", "usd")
        .query("order", "market_cap_desc")
        .query("per_page", per_page)
        .query("page", 1)
}

/// Rows for ids outside `assets` keep the provider's own symbol, upper-cased
pub fn parse_markets(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    let rows: Vec<MarketRow> = from_body(body, "coingecko markets")?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let price = row.current_price?;
            let symbol = asset_by_id(assets, &row.id)
                .map(|a| a.symbol.clone())
                .unwrap_or_else(|| row.symbol.to_uppercase());
            Some(MarketData {
                symbol,
                name: row.name,
                price,
                change_24h: row.price_change_24h,
                change_percent_24h: row.price_change_percentage_24h.unwrap_or(0.0),
                volume_24h: row.total_volume,
                market_cap: row.market_cap,
                high_24h: row.high_24h,
                low_24h: row.low_24h,
                last_updated: row
                    .last_updated
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or_else(Utc::now),
                source: source.to_string(),
            })
        })
        .collect())
}

pub fn simple_price_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/simple/price")
        .query("ids", ids(assets))
        .query("vs_currencies", "usd")
        .query("include_24hr_change", "true")
        .query("include_24hr_vol", "true")
        .query("include_market_cap", "true")
}

pub fn parse_simple_price(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    let prices: HashMap<String, SimplePrice> = from_body(body, "coingecko simple price")?;

    Ok(assets
        .iter()
        .filter_map(|asset| {
            let quote = prices.get(&asset.coingecko_id)?;
            let mut data = MarketData::from_price(&asset.symbol, &asset.name, quote.usd?, source);
            data.change_percent_24h = quote.usd_24h_change.unwrap_or(0.0);
            data.volume_24h = quote.usd_24h_vol;
            data.market_cap = quote.usd_market_cap;
            Some(data)
        })
        .collect())
}

pub fn market_chart_request(asset: &AssetInfo, days: u32) -> RequestTemplate {
    RequestTemplate::new(format!("/coins/{}/market_chart", asset.coingecko_id))
        .query("vs_currency", "usd")
        .query("days", days.max(1))
}

pub fn parse_market_chart(body: &str) -> Result<Vec<PricePoint>, ProviderError> {
    let chart: MarketChart = from_body(body, "coingecko market chart")?;
    Ok(chart
        .prices
        .into_iter()
        .filter_map(|(millis, price)| {
            Some(PricePoint {
                time: from_unix_millis(millis as i64)?,
                price,
            })
        })
        .collect())
}

pub fn trending_request() -> RequestTemplate {
    RequestTemplate::new("/search/trending")
}

pub fn parse_trending(body: &str) -> Result<Vec<TrendingCoin>, ProviderError> {
    let response: TrendingResponse = from_body(body, "coingecko trending")?;
    Ok(response
        .coins
        .into_iter()
        .map(|entry| TrendingCoin {
            id: entry.item.id,
            symbol: entry.item.symbol.to_uppercase(),
            name: entry.item.name,
            market_cap_rank: entry.item.market_cap_rank,
            thumb: entry.item.thumb,
        })
        .collect())
}

pub fn community_request(asset: &AssetInfo) -> RequestTemplate {
    RequestTemplate::new(format!("/coins/{}", asset.coingecko_id))
        .query("localization", "false")
        .query("tickers", "false")
        .query("market_data", "false")
        .query("community_data", "true")
        .query("developer_data", "false")
}

pub fn parse_community(body: &str) -> Result<CommunityStats, ProviderError> {
    let detail: CoinDetail = from_body(body, "coingecko coin detail")?;
    let followers = detail.community_data.and_then(|c| {
        match (c.twitter_followers, c.reddit_subscribers) {
            (None, None) => None,
            (t, r) => Some(t.unwrap_or(0).saturating_add(r.unwrap_or(0))),
        }
    });

    Ok(CommunityStats {
        up_votes_percentage: detail.sentiment_votes_up_percentage,
        followers,
    })
}
