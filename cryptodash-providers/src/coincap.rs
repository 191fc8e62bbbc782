//! CoinCap adapter
//!
//! REST (`/v2/assets`, `/v2/assets/{id}/history`) plus the price stream
//! message format. CoinCap encodes every number as a string.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{MarketData, PricePoint, ProviderError};

use crate::convert::{decimal_from_str, from_body, from_unix_millis, to_f64};
use crate::request::RequestTemplate;
use crate::symbols::AssetInfo;

pub const PRICE_STREAM_URL: &str = "wss://ws.coincap.io/prices";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRow {
    id: String,
    symbol: String,
    name: String,
    price_usd: Option<String>,
    change_percent_24_hr: Option<String>,
    volume_usd_24_hr: Option<String>,
    market_cap_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRow {
    price_usd: String,
    time: i64,
}

fn ids(assets: &[AssetInfo]) -> String {
    assets
        .iter()
        .map(|a| a.coincap_id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn assets_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/v2/assets").query("ids", ids(assets))
}

/// Top assets by market cap
pub fn top_assets_request(limit: usize) -> RequestTemplate {
    RequestTemplate::new("/v2/assets").query("limit", limit.clamp(1, 2000))
}

/// Rows for ids outside `assets` keep the provider's own symbol
pub fn parse_assets(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    let envelope: Envelope<Vec<AssetRow>> = from_body(body, "coincap assets")?;
    let updated = envelope
        .timestamp
        .and_then(from_unix_millis)
        .unwrap_or_else(Utc::now);

    Ok(envelope
        .data
        .into_iter()
        .filter_map(|row| {
            let price = row.price_usd.as_deref().and_then(decimal_from_str)?;
            let symbol = assets
                .iter()
                .find(|a| a.coincap_id == row.id)
                .map(|a| a.symbol.clone())
                .unwrap_or_else(|| row.symbol.to_uppercase());
            let mut data = MarketData::from_price(symbol, row.name, price, source);
            data.change_percent_24h =
                to_f64(row.change_percent_24_hr.as_deref().and_then(decimal_from_str));
            data.volume_24h = row.volume_usd_24_hr.as_deref().and_then(decimal_from_str);
            data.market_cap = row.market_cap_usd.as_deref().and_then(decimal_from_str);
            data.last_updated = updated;
            Some(data)
        })
        .collect())
}

/// Candle interval granular enough for the window without flooding it
fn interval_for(days: u32) -> &'static str {
    match days {
        0..=1 => "m15",
        2..=30 => "h1",
        _ => "d1",
    }
}

pub fn history_request(asset: &AssetInfo, days: u32, end: DateTime<Utc>) -> RequestTemplate {
    let start = end - Duration::days(i64::from(days.max(1)));
    RequestTemplate::new(format!("/v2/assets/{}/history", asset.coincap_id))
        .query("interval", interval_for(days))
        .query("start", start.timestamp_millis())
        .query("end", end.timestamp_millis())
}

pub fn parse_history(body: &str) -> Result<Vec<PricePoint>, ProviderError> {
    let envelope: Envelope<Vec<HistoryRow>> = from_body(body, "coincap history")?;
    Ok(envelope
        .data
        .into_iter()
        .filter_map(|row| {
            Some(PricePoint {
                time: from_unix_millis(row.time)?,
                price: decimal_from_str(&row.price_usd)?,
            })
        })
        .collect())
}

/// Stream URL subscribing to `assets`
pub fn price_stream_url(assets: &[AssetInfo]) -> String {
    format!("{}?assets={}", PRICE_STREAM_URL, ids(assets))
}

/// `{"bitcoin":"6929.82","ethereum":"404.97"}` into `(symbol, price)` pairs
///
/// Entries for assets outside `assets` and unparsable prices are skipped.
pub fn parse_price_message(
    text: &str,
    assets: &[AssetInfo],
) -> Result<Vec<(String, Decimal)>, ProviderError> {
    let prices: HashMap<String, String> = from_body(text, "coincap price message")?;
    let mut out: Vec<(String, Decimal)> = prices
        .into_iter()
        .filter_map(|(id, raw)| {
            let asset = assets.iter().find(|a| a.coincap_id == id)?;
            Some((asset.symbol.clone(), decimal_from_str(&raw)?))
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assets() -> Vec<AssetInfo> {
        vec![
            AssetInfo::new("BTC", "Bitcoin", "bitcoin", "bitcoin"),
            AssetInfo::new("BNB", "BNB", "binancecoin", "binance-coin"),
        ]
    }

    #[test]
    fn test_parse_assets() {
        let body = r#"{"data":[
            {"id":"bitcoin","rank":"1","symbol":"BTC","name":"Bitcoin","priceUsd":"6929.8217756835",
             "changePercent24Hr":"-0.8101417214","volumeUsd24Hr":"2927959461.1750323","marketCapUsd":"119150835874.4699281625"},
            {"id":"binance-coin","symbol":"BNB","name":"BNB","priceUsd":null}
        ],"timestamp":1533581098863}"#;

        let quotes = parse_assets(body, &assets(), "coincap").unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].price, dec!(6929.8217756835));
        assert!(quotes[0].change_percent_24h < 0.0);
        assert_eq!(quotes[0].last_updated.timestamp_millis(), 1533581098863);
    }

    #[test]
    fn test_history_request_window() {
        let end = from_unix_millis(1_709_337_600_000).unwrap();
        let template = history_request(&assets()[0], 7, end);
        assert_eq!(template.path, "/v2/assets/bitcoin/history");
        assert!(template.query.contains(&("interval".into(), "h1".into())));
        assert!(template
            .query
            .contains(&("start".into(), "1708732800000".into())));
    }

    #[test]
    fn test_parse_history() {
        let body = r#"{"data":[{"priceUsd":"6379.39","time":1530403200000,"date":"2018-07-01T00:00:00.000Z"}]}"#;
        let points = parse_history(body).unwrap();
        assert_eq!(points[0].price, dec!(6379.39));
    }

    #[test]
    fn test_parse_price_message_maps_ids() {
        let msg = r#"{"bitcoin":"6929.82","binance-coin":"404.97","monero":"100"}"#;
        let prices = parse_price_message(msg, &assets()).unwrap();
        assert_eq!(
            prices,
            vec![
                ("BNB".to_string(), dec!(404.97)),
                ("BTC".to_string(), dec!(6929.82))
            ]
        );
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            price_stream_url(&assets()),
            "wss://ws.coincap.io/prices?assets=bitcoin,binance-coin"
        );
    }
}
