//! Market data structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized spot quote for one asset (USD quoted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Logical ticker, e.g. "BTC"
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    /// Absolute 24h change, when the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<Decimal>,
    /// 24h change in percent
    pub change_percent_24h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
    /// Provider name this quote came from
    pub source: String,
}

impl MarketData {
    /// Minimal quote with only a price
    pub fn from_price(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            price,
            change_24h: None,
            change_percent_24h: 0.0,
            volume_24h: None,
            market_cap: None,
            high_24h: None,
            low_24h: None,
            last_updated: Utc::now(),
            source: source.into(),
        }
    }
}

/// Single point of a price history series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

/// Biggest 24h gainers and losers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopMovers {
    pub gainers: Vec<MarketData>,
    pub losers: Vec<MarketData>,
}

impl TopMovers {
    /// Split a quote list into the `limit` best and worst performers
    pub fn from_quotes(mut quotes: Vec<MarketData>, limit: usize) -> Self {
        quotes.sort_by(|a, b| {
            b.change_percent_24h
                .partial_cmp(&a.change_percent_24h)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let gainers: Vec<MarketData> = quotes
            .iter()
            .filter(|q| q.change_percent_24h > 0.0)
            .take(limit)
            .cloned()
            .collect();
        let losers: Vec<MarketData> = quotes
            .iter()
            .rev()
            .filter(|q| q.change_percent_24h < 0.0)
            .take(limit)
            .cloned()
            .collect();

        Self { gainers, losers }
    }

    pub fn is_empty(&self) -> bool {
        self.gainers.is_empty() && self.losers.is_empty()
    }
}

/// Coin currently trending in search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

/// Native-unit balance of an on-chain address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub chain: String,
    pub address: String,
    pub balance: Decimal,
    pub source: String,
}
