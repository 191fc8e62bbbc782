//! Binance spot adapter (USDT pairs as USD proxy)

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use cryptodash_core::{MarketData, PricePoint, ProviderError};

use crate::convert::{decimal_from_str, from_body, from_unix_millis, to_f64};
use crate::request::RequestTemplate;
use crate::symbols::AssetInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    price_change: Option<String>,
    price_change_percent: Option<String>,
    high_price: Option<String>,
    low_price: Option<String>,
    quote_volume: Option<String>,
    close_time: Option<i64>,
}

/// `["BTCUSDT","ETHUSDT"]`, the array syntax the `symbols` parameter expects
fn symbols_param(assets: &[AssetInfo]) -> String {
    let quoted: Vec<String> = assets
        .iter()
        .map(|a| format!("\"{}\"", a.binance_pair))
        .collect();
    format!("[{}]", quoted.join(","))
}

pub fn ticker_24h_request(assets: &[AssetInfo]) -> RequestTemplate {
    RequestTemplate::new("/api/v3/ticker/24hr").query("symbols", symbols_param(assets))
}

pub fn parse_ticker_24h(
    body: &str,
    assets: &[AssetInfo],
    source: &str,
) -> Result<Vec<MarketData>, ProviderError> {
    let tickers: Vec<Ticker24h> = from_body(body, "binance 24hr ticker")?;

    Ok(tickers
        .into_iter()
        .filter_map(|t| {
            let asset = assets.iter().find(|a| a.binance_pair == t.symbol)?;
            let price = decimal_from_str(&t.last_price)?;
            let mut data = MarketData::from_price(&asset.symbol, &asset.name, price, source);
            data.change_24h = t.price_change.as_deref().and_then(decimal_from_str);
            data.change_percent_24h =
                to_f64(t.price_change_percent.as_deref().and_then(decimal_from_str));
            data.high_24h = t.high_price.as_deref().and_then(decimal_from_str);
            data.low_24h = t.low_price.as_deref().and_then(decimal_from_str);
            data.volume_24h = t.quote_volume.as_deref().and_then(decimal_from_str);
            data.last_updated = t
                .close_time
                .and_then(from_unix_millis)
                .unwrap_or_else(Utc::now);
            Some(data)
        })
        .collect())
}

pub fn klines_request(asset: &AssetInfo, days: u32) -> RequestTemplate {
    let (interval, limit) = if days <= 1 {
        ("15m", 96)
    } else if days <= 30 {
        ("1h", days * 24)
    } else {
        ("1d", days.min(1000))
    };
    RequestTemplate::new("/api/v3/klines")
        .query("symbol", &asset.binance_pair)
        .query("interval", interval)
        .query("limit", limit.min(1000))
}

/// Kline rows are heterogeneous arrays: `[openTime, "open", "high", "low", "close", ...]`
pub fn parse_klines(body: &str) -> Result<Vec<PricePoint>, ProviderError> {
    let rows: Vec<Vec<Value>> = from_body(body, "binance klines")?;
    rows.iter()
        .map(|row| {
            let time = row
                .first()
                .and_then(Value::as_i64)
                .and_then(from_unix_millis)
                .ok_or_else(|| ProviderError::parse("binance kline without open time"))?;
            let price: Decimal = row
                .get(4)
                .and_then(Value::as_str)
                .and_then(decimal_from_str)
                .ok_or_else(|| ProviderError::parse("binance kline without close price"))?;
            Ok(PricePoint { time, price })
        })
        .collect()
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
    fn test_symbols_param() {
        let template = ticker_24h_request(&assets());
        assert_eq!(
            template.query,
            vec![("symbols".to_string(), r#"["BTCUSDT","ETHUSDT"]"#.to_string())]
        );
    }

    #[test]
    fn test_parse_ticker_24h() {
        let body = r#"[{"symbol":"ETHUSDT","priceChange":"-12.5","priceChangePercent":"-0.357",
            "lastPrice":"3490.10","highPrice":"3550.00","lowPrice":"3400.00","quoteVolume":"1500000000.5",
            "openTime":1709208000000,"closeTime":1709294399999}]"#;
        let quotes = parse_ticker_24h(body, &assets(), "binance").unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "ETH");
        assert_eq!(quotes[0].price, dec!(3490.10));
        assert_eq!(quotes[0].change_24h, Some(dec!(-12.5)));
        assert!((quotes[0].change_percent_24h + 0.357).abs() < 1e-9);
    }

    #[test]
    fn test_parse_klines() {
        let body = r#"[[1709164800000,"61000.0","62000.0","60000.0","61500.5","100.0",1709251199999,"0",1,"0","0","0"]]"#;
        let points = parse_klines(body).unwrap();
        assert_eq!(points[0].price, dec!(61500.5));
        assert_eq!(points[0].time.timestamp_millis(), 1709164800000);
    }

    #[test]
    fn test_malformed_kline_is_parse_error() {
        let err = parse_klines(r#"[[1709164800000]]"#).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_klines_request_interval() {
        let template = klines_request(&assets()[0], 7);
        assert!(template.query.contains(&("interval".into(), "1h".into())));
        assert!(template.query.contains(&("limit".into(), "168".into())));
    }
}
