//! CryptoCompare adapter
//!
//! CryptoCompare answers most application errors with HTTP 200 and a
//! `{"Response":"Error","Message":...}` body, so every parser checks for it.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{MarketData, NewsArticle, PricePoint, ProviderError};

use crate::convert::{from_body, from_unix_secs};
use crate::request::RequestTemplate;
use crate::symbols::AssetInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorEnvelope {
    response: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FullPrices {
    #[serde(rename = "RAW")]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawQuote {
    price: Option<Decimal>,
    #[serde(rename = "CHANGE24HOUR")]
    change_24h: Option<Decimal>,
    #[serde(rename = "CHANGEPCT24HOUR")]
    change_pct_24h: Option<f64>,
    #[serde(rename = "VOLUME24HOURTO")]
    volume_24h: Option<Decimal>,
    mktcap: Option<Decimal>,
    #[serde(rename = "HIGH24HOUR")]
    high_24h: Option<Decimal>,
    #[serde(rename = "LOW24HOUR")]
    low_24h: Option<Decimal>,
    lastupdate: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoDay {
    data: HistoData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoData {
    data: Vec<HistoRow>,
}

#[derive(Debug, Deserialize)]
struct HistoRow {
    time: i64,
    close: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NewsEnvelope {
    data: Vec<NewsRow>,
}

#[derive(Debug, Deserialize)]
struct NewsRow {
    id: String,
    published_on: i64,
    imageurl: Option<String>,
    title: String,
    url: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    categories: String,
    source_info: Option<SourceInfo>,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    name: String,
}

/// Surface a `Response: Error` body as a parse error
fn check_envelope(body: &str) -> Result<(), ProviderError> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if envelope.response.as_deref() == Some("Error") {
            return Err(ProviderError::parse(format!(
                "cryptocompare error: {}",
                envelope.message.unwrap_or_default()
            )));
        }
    }
    Ok(())
}

fn fsyms(assets: &[AssetInfo]) -> String {
    assets
        .iter()
        .map(|a| a.symbol.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn full_prices_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/data/pricemultifull")
        .query("fsyms", fsyms(assets))
        .query("tsyms", "USD")
}

pub fn parse_full_prices(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    check_envelope(body)?;
    let prices: FullPrices = from_body(body, "cryptocompare pricemultifull")?;

    Ok(assets
        .iter()
        .filter_map(|asset| {
            let quote = prices.raw.get(&asset.symbol)?.get("USD")?;
            let mut data = MarketData::from_price(&asset.symbol, &asset.name, quote.price?, source);
            data.change_24h = quote.change_24h;
            data.change_percent_24h = quote.change_pct_24h.unwrap_or(0.0);
            data.volume_24h = quote.volume_24h;
            data.market_cap = quote.mktcap;
            data.high_24h = quote.high_24h;
            data.low_24h = quote.low_24h;
            data.last_updated = quote
                .lastupdate
                .and_then(from_unix_secs)
                .unwrap_or_else(Utc::now);
            Some(data)
        })
        .collect())
}

pub fn simple_prices_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/data/pricemulti")
        .query("fsyms", fsyms(assets))
        .query("tsyms", "USD")
}

pub fn parse_simple_prices(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    check_envelope(body)?;
    let prices: HashMap<String, HashMap<String, Decimal>> =
        from_body(body, "cryptocompare pricemulti")?;

    Ok(assets
        .iter()
        .filter_map(|asset| {
            let price = *prices.get(&asset.symbol)?.get("USD")?;
            Some(MarketData::from_price(&asset.symbol, &asset.name, price, source))
        })
        .collect())
}

pub fn histoday_request(asset: &AssetInfo, days: u32) -> RequestTemplate {
    RequestTemplate::new("/data/v2/histoday")
        .query("fsym", &asset.symbol)
        .query("tsym", "USD")
        .query("limit", days.max(1))
}

pub fn parse_histoday(body: &str) -> Result<Vec<PricePoint>, ProviderError> {
    check_envelope(body)?;
    let histo: HistoDay = from_body(body, "cryptocompare histoday")?;
    Ok(histo
        .data
        .data
        .into_iter()
        .filter_map(|row| {
            Some(PricePoint {
                time: from_unix_secs(row.time)?,
                price: row.close,
            })
        })
        .collect())
}

pub fn news_request() -> RequestTemplate {
    RequestTemplate::new("/data/v2/news/")
        .query("lang", "EN")
        .query("sortOrder", "latest")
}

/// Latest articles tagged with `symbol`
pub fn news_for_request(symbol: &str) -> RequestTemplate {
    news_request().query("categories", symbol.to_uppercase())
}

pub fn parse_news(body: &str, provider: &str) -> Result<Vec<NewsArticle>, ProviderError> {
    check_envelope(body)?;
    let envelope: NewsEnvelope = from_body(body, "cryptocompare news")?;

    Ok(envelope
        .data
        .into_iter()
        .filter_map(|row| {
            let published_at = from_unix_secs(row.published_on)?;
            let source = row
                .source_info
                .map(|s| s.name)
                .or(row.source)
                .unwrap_or_else(|| "CryptoCompare".to_string());
            Some(NewsArticle {
                id: format!("cryptocompare-{}", row.id),
                title: row.title,
                description: row.body,
                url: row.url,
                source,
                published_at,
                image_url: row.imageurl.filter(|u| !u.is_empty()),
                currencies: row
                    .categories
                    .split('|')
                    .map(str::trim)
                    .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_uppercase()))
                    .map(str::to_string)
                    .collect(),
                provider: provider.to_string(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assets() -> Vec<AssetInfo> {
        vec![
            AssetInfo::new("BTC", "Bitcoin", "bitcoin", "bitcoin"),
            AssetInfo::new("ETH", "Ethereum", "ethereum", "ethereum"),
        ]
    }

    #[test]
    fn test_parse_full_prices() {
        let body = r#"{"RAW":{"BTC":{"USD":{"PRICE":67000.5,"CHANGE24HOUR":-500.5,"CHANGEPCT24HOUR":-0.74,
            "VOLUME24HOURTO":1200000000,"MKTCAP":1300000000000,"HIGH24HOUR":68000,"LOW24HOUR":66000,
            "LASTUPDATE":1709294400}}},"DISPLAY":{}}"#;
        let quotes = parse_full_prices(body, &assets(), "cryptocompare").unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price, dec!(67000.5));
        assert_eq!(quotes[0].change_24h, Some(dec!(-500.5)));
        assert_eq!(quotes[0].name, "Bitcoin");
        assert_eq!(quotes[0].last_updated.timestamp(), 1709294400);
    }

    #[test]
    fn test_error_envelope_is_parse_error() {
        let body = r#"{"Response":"Error","Message":"fsyms param is empty","HasWarning":false,"Type":2,"Data":{}}"#;
        let err = parse_full_prices(body, &assets(), "cryptocompare").unwrap_err();
        assert_eq!(
            err,
            ProviderError::parse("cryptocompare error: fsyms param is empty")
        );
    }

    #[test]
    fn test_parse_simple_prices() {
        let body = r#"{"BTC":{"USD":67000},"ETH":{"USD":3500.5}}"#;
        let quotes = parse_simple_prices(body, &assets(), "cryptocompare").unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[1].symbol, "ETH");
        assert_eq!(quotes[1].price, dec!(3500.5));
    }

    #[test]
    fn test_parse_histoday() {
        let body = r#"{"Response":"Success","Message":"","Data":{"Aggregated":false,"TimeFrom":1,"TimeTo":2,
            "Data":[{"time":1709164800,"high":1,"low":1,"open":1,"close":61000.5},{"time":1709251200,"close":62000}]}}"#;
        let points = parse_histoday(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, dec!(61000.5));
    }

    #[test]
    fn test_parse_news() {
        let body = r#"{"Type":100,"Message":"News list successfully returned","Data":[
            {"id":"123","guid":"g","published_on":1709294400,"imageurl":"https://img/1.png",
             "title":"Bitcoin tops $67k","url":"https://news.test/btc","body":"Rally continues",
             "tags":"","categories":"BTC|Market|ETH","source_info":{"name":"CoinDesk","lang":"EN"},"source":"coindesk"}
        ]}"#;
        let articles = parse_news(body, "cryptocompare").unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.id, "cryptocompare-123");
        assert_eq!(a.source, "CoinDesk");
        assert_eq!(a.currencies, vec!["BTC", "ETH"]);
        assert_eq!(a.description, "Rally continues");
    }
}
