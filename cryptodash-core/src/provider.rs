//! Provider configuration
//!
//! A provider is one concrete third-party API. Its configuration is loaded
//! once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Known upstream APIs
///
/// The id selects the payload shape a response is parsed with, so two
/// configs may share an id (e.g. a mirror of the same API on another host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    CoinGecko,
    CoinCap,
    CryptoCompare,
    Binance,
    CryptoPanic,
    NewsApi,
    AlternativeMe,
    WhaleAlert,
    Blockchair,
    Etherscan,
}

impl ProviderId {
    /// Default display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::CoinGecko => "coingecko",
            ProviderId::CoinCap => "coincap",
            ProviderId::CryptoCompare => "cryptocompare",
            ProviderId::Binance => "binance",
            ProviderId::CryptoPanic => "cryptopanic",
            ProviderId::NewsApi => "newsapi",
            ProviderId::AlternativeMe => "alternative.me",
            ProviderId::WhaleAlert => "whale-alert",
            ProviderId::Blockchair => "blockchair",
            ProviderId::Etherscan => "etherscan",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How a provider expects its credential to be presented
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderAuth {
    /// Anonymous access
    None,
    /// API key in a request header, e.g. `X-Api-Key: <key>`
    HeaderKey { header: String, key: String },
    /// API key as a query parameter, e.g. `?api_key=<key>`
    QueryParamKey { param: String, key: String },
    /// `Authorization: Bearer <token>`
    BearerToken(String),
}

impl ProviderAuth {
    pub fn header(header: impl Into<String>, key: impl Into<String>) -> Self {
        ProviderAuth::HeaderKey {
            header: header.into(),
            key: key.into(),
        }
    }

    pub fn query_param(param: impl Into<String>, key: impl Into<String>) -> Self {
        ProviderAuth::QueryParamKey {
            param: param.into(),
            key: key.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        ProviderAuth::BearerToken(token.into())
    }

    /// Whether a credential is attached
    pub fn has_credential(&self) -> bool {
        !matches!(self, ProviderAuth::None)
    }
}

impl fmt::Debug for ProviderAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderAuth::None => f.write_str("None"),
            ProviderAuth::HeaderKey { header, .. } => f
                .debug_struct("HeaderKey")
                .field("header", header)
                .field("key", &"[REDACTED]")
                .finish(),
            ProviderAuth::QueryParamKey { param, .. } => f
                .debug_struct("QueryParamKey")
                .field("param", param)
                .field("key", &"[REDACTED]")
                .finish(),
            ProviderAuth::BearerToken(_) => f.write_str("BearerToken([REDACTED])"),
        }
    }
}

/// Token bucket budget: at most `requests` per `per`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub per: Duration,
}

impl RateLimit {
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            per: Duration::from_secs(60),
        }
    }

    pub fn per_second(requests: u32) -> Self {
        Self {
            requests,
            per: Duration::from_secs(1),
        }
    }
}

/// One candidate provider for a capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// Name recorded in attempt logs and returned as the result source
    pub name: String,
    pub base_url: String,
    pub auth: ProviderAuth,
    /// Lower is tried first
    pub priority: u32,
    pub rate_limit: Option<RateLimit>,
}

impl ProviderConfig {
    pub fn new(id: ProviderId, base_url: impl Into<String>, priority: u32) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            base_url: base_url.into(),
            auth: ProviderAuth::None,
            priority,
            rate_limit: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_auth(mut self, auth: ProviderAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Attach `auth` built from `key` only when a key is present
    pub fn with_optional_key(
        mut self,
        key: Option<String>,
        auth: impl FnOnce(String) -> ProviderAuth,
    ) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.auth = auth(key);
        }
        self
    }

    /// Same provider at another position, e.g. when shared between chains
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_credentials() {
        let config = ProviderConfig::new(ProviderId::NewsApi, "https://newsapi.org", 3)
            .with_auth(ProviderAuth::header("X-Api-Key", "super-secret"));

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));

        let bearer = format!("{:?}", ProviderAuth::bearer("tok-123"));
        assert!(!bearer.contains("tok-123"));
    }

    #[test]
    fn test_optional_key_skips_blank() {
        let config = ProviderConfig::new(ProviderId::CoinCap, "https://api.coincap.io", 2)
            .with_optional_key(Some("  ".to_string()), ProviderAuth::bearer);
        assert_eq!(config.auth, ProviderAuth::None);

        let config = config.with_optional_key(Some("abc".to_string()), ProviderAuth::bearer);
        assert!(config.auth.has_credential());
    }
}
