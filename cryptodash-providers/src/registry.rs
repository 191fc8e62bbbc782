//! Provider registry
//!
//! Maps each [`Capability`] to its fallback chain. Chains are kept sorted by
//! priority at insertion time; equal priorities keep registration order.

use std::collections::HashMap;

use cryptodash_core::{Capability, ProviderAuth, ProviderConfig, ProviderId, RateLimit};

pub const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";
pub const COINCAP_BASE: &str = "https://api.coincap.io";
pub const CRYPTOCOMPARE_BASE: &str = "https://min-api.cryptocompare.com";
pub const BINANCE_BASE: &str = "https://api.binance.com";
pub const CRYPTOPANIC_BASE: &str = "https://cryptopanic.com/api/v1";
pub const NEWSAPI_BASE: &str = "https://newsapi.org/v2";
pub const ALTERNATIVE_ME_BASE: &str = "https://api.alternative.me";
pub const WHALE_ALERT_BASE: &str = "https://api.whale-alert.io/v1";
pub const BLOCKCHAIR_BASE: &str = "https://api.blockchair.com";
pub const ETHERSCAN_BASE: &str = "https://api.etherscan.io";

/// Optional credentials for the default roster
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderKeys {
    pub coingecko: Option<String>,
    pub coincap: Option<String>,
    pub cryptocompare: Option<String>,
    pub cryptopanic: Option<String>,
    pub newsapi: Option<String>,
    pub whale_alert: Option<String>,
    pub etherscan: Option<String>,
}

impl ProviderKeys {
    /// Read `<PROVIDER>_API_KEY` variables; unset or blank means anonymous
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            coingecko: read("COINGECKO_API_KEY"),
            coincap: read("COINCAP_API_KEY"),
            cryptocompare: read("CRYPTOCOMPARE_API_KEY"),
            cryptopanic: read("CRYPTOPANIC_API_KEY"),
            newsapi: read("NEWSAPI_API_KEY"),
            whale_alert: read("WHALE_ALERT_API_KEY"),
            etherscan: read("ETHERSCAN_API_KEY"),
        }
    }
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "[REDACTED]" } else { "None" };
        f.debug_struct("ProviderKeys")
            .field("coingecko", &mask(&self.coingecko))
            .field("coincap", &mask(&self.coincap))
            .field("cryptocompare", &mask(&self.cryptocompare))
            .field("cryptopanic", &mask(&self.cryptopanic))
            .field("newsapi", &mask(&self.newsapi))
            .field("whale_alert", &mask(&self.whale_alert))
            .field("etherscan", &mask(&self.etherscan))
            .finish()
    }
}

/// Capability to ordered provider chain
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    chains: HashMap<Capability, Vec<ProviderConfig>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `provider` to the chain for `capability`
    ///
    /// Inserted after every provider whose priority is lower or equal.
    pub fn register(&mut self, capability: Capability, provider: ProviderConfig) {
        let chain = self.chains.entry(capability).or_default();
        let position = chain
            .iter()
            .position(|p| p.priority > provider.priority)
            .unwrap_or(chain.len());
        chain.insert(position, provider);
    }

    pub fn with(mut self, capability: Capability, provider: ProviderConfig) -> Self {
        self.register(capability, provider);
        self
    }

    /// Chain for `capability`, lowest priority number first
    pub fn providers(&self, capability: Capability) -> &[ProviderConfig] {
        self.chains
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every distinct provider (by name) across all chains
    pub fn all_providers(&self) -> Vec<&ProviderConfig> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for capability in Capability::ALL {
            for provider in self.providers(capability) {
                if seen.insert(provider.name.as_str()) {
                    out.push(provider);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.chains.values().all(Vec::is_empty)
    }

    /// Default roster with whatever credentials are available
    pub fn with_defaults(keys: &ProviderKeys) -> Self {
        let coingecko = ProviderConfig::new(ProviderId::CoinGecko, COINGECKO_BASE, 1)
            .with_optional_key(keys.coingecko.clone(), |k| {
                ProviderAuth::header("x-cg-demo-api-key", k)
            })
            .with_rate_limit(RateLimit::per_minute(30));
        let coincap = ProviderConfig::new(ProviderId::CoinCap, COINCAP_BASE, 2)
            .with_optional_key(keys.coincap.clone(), ProviderAuth::bearer)
            .with_rate_limit(RateLimit::per_minute(200));
        let cryptocompare = ProviderConfig::new(ProviderId::CryptoCompare, CRYPTOCOMPARE_BASE, 3)
            .with_optional_key(keys.cryptocompare.clone(), |k| {
                ProviderAuth::query_param("api_key", k)
            })
            .with_rate_limit(RateLimit::per_second(20));
        let binance = ProviderConfig::new(ProviderId::Binance, BINANCE_BASE, 4)
            .with_rate_limit(RateLimit::per_minute(1200));
        let cryptopanic = ProviderConfig::new(ProviderId::CryptoPanic, CRYPTOPANIC_BASE, 1)
            .with_optional_key(keys.cryptopanic.clone(), |k| {
                ProviderAuth::query_param("auth_token", k)
            })
            .with_rate_limit(RateLimit::per_minute(30));
        let newsapi = ProviderConfig::new(ProviderId::NewsApi, NEWSAPI_BASE, 3)
            .with_optional_key(keys.newsapi.clone(), |k| ProviderAuth::header("X-Api-Key", k))
            .with_rate_limit(RateLimit::per_minute(30));
        let alternative_me = ProviderConfig::new(ProviderId::AlternativeMe, ALTERNATIVE_ME_BASE, 1)
            .with_rate_limit(RateLimit::per_minute(60));
        let whale_alert = ProviderConfig::new(ProviderId::WhaleAlert, WHALE_ALERT_BASE, 1)
            .with_optional_key(keys.whale_alert.clone(), |k| {
                ProviderAuth::query_param("api_key", k)
            })
            .with_rate_limit(RateLimit::per_minute(10));
        let blockchair = ProviderConfig::new(ProviderId::Blockchair, BLOCKCHAIR_BASE, 2)
            .with_rate_limit(RateLimit::per_minute(30));
        let etherscan = ProviderConfig::new(ProviderId::Etherscan, ETHERSCAN_BASE, 1)
            .with_optional_key(keys.etherscan.clone(), |k| {
                ProviderAuth::query_param("apikey", k)
            })
            .with_rate_limit(RateLimit::per_second(5));

        Self::new()
            .with(Capability::MarketData, coingecko.clone())
            .with(Capability::MarketData, coincap)
            .with(Capability::MarketData, cryptocompare.clone())
            .with(Capability::MarketData, binance)
            .with(Capability::News, cryptopanic)
            .with(Capability::News, cryptocompare.with_priority(2))
            .with(Capability::News, newsapi)
            .with(Capability::Sentiment, alternative_me)
            .with(Capability::Sentiment, coingecko.with_priority(2))
            .with(Capability::WhaleTracking, whale_alert)
            .with(Capability::WhaleTracking, blockchair.clone())
            .with(Capability::Blockchain, etherscan)
            .with(Capability::Blockchain, blockchair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, priority: u32) -> ProviderConfig {
        ProviderConfig::new(ProviderId::CoinGecko, "https://example.test", priority).with_name(name)
    }

    fn names(registry: &ProviderRegistry, capability: Capability) -> Vec<String> {
        registry
            .providers(capability)
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn test_chain_sorted_by_priority() {
        let registry = ProviderRegistry::new()
            .with(Capability::MarketData, provider("c", 3))
            .with(Capability::MarketData, provider("a", 1))
            .with(Capability::MarketData, provider("b", 2));

        assert_eq!(names(&registry, Capability::MarketData), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let registry = ProviderRegistry::new()
            .with(Capability::News, provider("first", 1))
            .with(Capability::News, provider("second", 1))
            .with(Capability::News, provider("zero", 0))
            .with(Capability::News, provider("third", 1));

        assert_eq!(
            names(&registry, Capability::News),
            vec!["zero", "first", "second", "third"]
        );
    }

    #[test]
    fn test_unknown_capability_is_empty() {
        let registry = ProviderRegistry::new();
        assert!(registry.providers(Capability::Blockchain).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_roster() {
        let registry = ProviderRegistry::with_defaults(&ProviderKeys::default());

        assert_eq!(
            names(&registry, Capability::MarketData),
            vec!["coingecko", "coincap", "cryptocompare", "binance"]
        );
        assert_eq!(
            names(&registry, Capability::News),
            vec!["cryptopanic", "cryptocompare", "newsapi"]
        );
        assert_eq!(
            names(&registry, Capability::Sentiment),
            vec!["alternative.me", "coingecko"]
        );
        assert_eq!(
            names(&registry, Capability::WhaleTracking),
            vec!["whale-alert", "blockchair"]
        );
        assert_eq!(
            names(&registry, Capability::Blockchain),
            vec!["etherscan", "blockchair"]
        );
        // shared providers appear once
        assert_eq!(registry.all_providers().len(), 10);
    }

    #[test]
    fn test_default_roster_applies_keys() {
        let keys = ProviderKeys {
            newsapi: Some("n-key".to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::with_defaults(&keys);
        let newsapi = registry
            .providers(Capability::News)
            .iter()
            .find(|p| p.id == ProviderId::NewsApi)
            .unwrap();
        assert_eq!(newsapi.auth, ProviderAuth::header("X-Api-Key", "n-key"));

        let coingecko = &registry.providers(Capability::MarketData)[0];
        assert!(!coingecko.auth.has_credential());
        assert!(!format!("{:?}", keys).contains("n-key"));
    }
}
