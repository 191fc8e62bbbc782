//! Dashboard configuration
//!
//! Every knob has a documented default; [`DashboardConfig::from_env`] lets
//! deployments override credentials and the numeric settings.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use cryptodash_providers::ProviderKeys;

use crate::cache::{HISTORY_TTL, NEWS_TTL, PRICE_TTL, SENTIMENT_TTL};
use crate::engine::DEFAULT_ATTEMPT_TIMEOUT;
use crate::health::DEFAULT_HEALTH_CAPACITY;

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Per-query cache lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub prices: Duration,
    pub history: Duration,
    pub news: Duration,
    pub sentiment: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            prices: PRICE_TTL,
            history: HISTORY_TTL,
            news: NEWS_TTL,
            sentiment: SENTIMENT_TTL,
        }
    }
}

/// Live price feed policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Consecutive connection failures tolerated before polling
    pub reconnect_attempts: u32,
    pub reconnect_backoff: Duration,
    /// Longest a single connect or re-probe may take; elapsing counts as a failure
    pub connect_timeout: Duration,
    /// Snapshot cadence while polling
    pub poll_interval: Duration,
    /// How often the stream is retried while polling
    pub reprobe_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_backoff: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            reprobe_interval: Duration::from_secs(60),
        }
    }
}

/// Whale tracking settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhaleConfig {
    pub min_value_usd: u64,
    pub poll_interval: Duration,
    /// First poll looks back this far
    pub lookback: Duration,
    /// Transaction ids remembered for de-duplication
    pub dedupe_window: usize,
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self {
            min_value_usd: 500_000,
            poll_interval: Duration::from_secs(60),
            lookback: Duration::from_secs(60 * 60),
            dedupe_window: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub keys: ProviderKeys,
    pub attempt_timeout: Duration,
    pub health_capacity: usize,
    pub ttls: CacheTtls,
    pub feed: FeedConfig,
    pub whale: WhaleConfig,
    /// Symbols streamed by real-time monitoring
    pub watchlist: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            keys: ProviderKeys::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            health_capacity: DEFAULT_HEALTH_CAPACITY,
            ttls: CacheTtls::default(),
            feed: FeedConfig::default(),
            whale: WhaleConfig::default(),
            watchlist: ["BTC", "ETH", "SOL", "BNB", "XRP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        config.keys = ProviderKeys::from_lookup(&lookup);

        if let Some(secs) = parse_var::<u64>(&read, "DASHBOARD_ATTEMPT_TIMEOUT_SECS")? {
            config.attempt_timeout =
                Duration::from_secs(positive("DASHBOARD_ATTEMPT_TIMEOUT_SECS", secs)?);
        }
        if let Some(capacity) = parse_var::<usize>(&read, "DASHBOARD_HEALTH_CAPACITY")? {
            config.health_capacity =
                positive("DASHBOARD_HEALTH_CAPACITY", capacity as u64)? as usize;
        }
        if let Some(secs) = parse_var::<u64>(&read, "DASHBOARD_FEED_CONNECT_TIMEOUT_SECS")? {
            config.feed.connect_timeout =
                Duration::from_secs(positive("DASHBOARD_FEED_CONNECT_TIMEOUT_SECS", secs)?);
        }
        if let Some(min) = parse_var::<u64>(&read, "DASHBOARD_WHALE_MIN_USD")? {
            config.whale.min_value_usd = min;
        }
        if let Some(secs) = parse_var::<u64>(&read, "DASHBOARD_WHALE_POLL_SECS")? {
            config.whale.poll_interval =
                Duration::from_secs(positive("DASHBOARD_WHALE_POLL_SECS", secs)?);
        }
        if let Some(list) = read("DASHBOARD_WATCHLIST") {
            let symbols: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                config.watchlist = symbols;
            }
        }

        Ok(config)
    }
}

fn parse_var<T>(
    read: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = read(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

fn positive(name: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.health_capacity, 200);
        assert_eq!(config.ttls.prices, Duration::from_secs(60));
        assert_eq!(config.ttls.news, Duration::from_secs(300));
        assert_eq!(config.feed.reconnect_attempts, 5);
        assert_eq!(config.feed.reprobe_interval, Duration::from_secs(60));
        assert_eq!(config.feed.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("NEWSAPI_API_KEY", "abc"),
            ("COINGECKO_API_KEY", "  "),
            ("DASHBOARD_ATTEMPT_TIMEOUT_SECS", "5"),
            ("DASHBOARD_HEALTH_CAPACITY", "50"),
            ("DASHBOARD_WHALE_MIN_USD", "1000000"),
            ("DASHBOARD_FEED_CONNECT_TIMEOUT_SECS", "3"),
            ("DASHBOARD_WATCHLIST", "btc, doge,"),
        ]))
        .unwrap();

        assert_eq!(config.keys.newsapi.as_deref(), Some("abc"));
        assert_eq!(config.keys.coingecko, None);
        assert_eq!(config.attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.health_capacity, 50);
        assert_eq!(config.whale.min_value_usd, 1_000_000);
        assert_eq!(config.feed.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.watchlist, vec!["BTC", "DOGE"]);
    }

    #[test]
    fn test_malformed_number() {
        let err = DashboardConfig::from_lookup(lookup(&[("DASHBOARD_WHALE_POLL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref name, .. } if name == "DASHBOARD_WHALE_POLL_SECS"
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(DashboardConfig::from_lookup(lookup(&[("DASHBOARD_ATTEMPT_TIMEOUT_SECS", "0")]))
            .is_err());
    }
}
