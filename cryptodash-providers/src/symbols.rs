//! Logical ticker to provider identifier mapping

use std::collections::HashMap;

/// Identifiers of one asset across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Logical ticker, upper case
    pub symbol: String,
    pub name: String,
    pub coingecko_id: String,
    pub coincap_id: String,
    /// USDT spot pair
    pub binance_pair: String,
}

impl AssetInfo {
    pub fn new(symbol: &str, name: &str, coingecko_id: &str, coincap_id: &str) -> Self {
        let symbol = symbol.to_uppercase();
        Self {
            binance_pair: format!("{}USDT", symbol),
            symbol,
            name: name.to_string(),
            coingecko_id: coingecko_id.to_string(),
            coincap_id: coincap_id.to_string(),
        }
    }

    /// Best guess for a ticker with no table entry
    pub fn guess(symbol: &str) -> Self {
        let lower = symbol.to_lowercase();
        Self::new(symbol, &symbol.to_uppercase(), &lower, &lower)
    }
}

/// Lookup table shared by every market adapter
#[derive(Debug, Clone)]
pub struct SymbolMap {
    by_symbol: HashMap<String, AssetInfo>,
}

impl SymbolMap {
    pub fn empty() -> Self {
        Self {
            by_symbol: HashMap::new(),
        }
    }

    pub fn insert(&mut self, asset: AssetInfo) {
        self.by_symbol.insert(asset.symbol.clone(), asset);
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetInfo> {
        self.by_symbol.get(&symbol.trim().to_uppercase())
    }

    /// Table entry, or a guessed mapping for unknown tickers
    pub fn resolve(&self, symbol: &str) -> AssetInfo {
        self.get(symbol)
            .cloned()
            .unwrap_or_else(|| AssetInfo::guess(symbol.trim()))
    }

    pub fn resolve_all(&self, symbols: &[String]) -> Vec<AssetInfo> {
        let mut seen = std::collections::HashSet::new();
        symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_uppercase()))
            .map(|s| self.resolve(s))
            .collect()
    }

    pub fn by_coingecko_id(&self, id: &str) -> Option<&AssetInfo> {
        self.by_symbol.values().find(|a| a.coingecko_id == id)
    }

    pub fn by_coincap_id(&self, id: &str) -> Option<&AssetInfo> {
        self.by_symbol.values().find(|a| a.coincap_id == id)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.by_symbol.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

impl Default for SymbolMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (symbol, name, coingecko, coincap) in [
            ("BTC", "Bitcoin", "bitcoin", "bitcoin"),
            ("ETH", "Ethereum", "ethereum", "ethereum"),
            ("SOL", "Solana", "solana", "solana"),
            ("BNB", "BNB", "binancecoin", "binance-coin"),
            ("XRP", "XRP", "ripple", "xrp"),
            ("ADA", "Cardano", "cardano", "cardano"),
            ("DOGE", "Dogecoin", "dogecoin", "dogecoin"),
            ("AVAX", "Avalanche", "avalanche-2", "avalanche"),
            ("DOT", "Polkadot", "polkadot", "polkadot"),
            ("MATIC", "Polygon", "matic-network", "polygon"),
            ("LINK", "Chainlink", "chainlink", "chainlink"),
            ("LTC", "Litecoin", "litecoin", "litecoin"),
            ("TRX", "TRON", "tron", "tron"),
            ("ATOM", "Cosmos", "cosmos", "cosmos"),
            ("UNI", "Uniswap", "uniswap", "uniswap"),
        ] {
            map.insert(AssetInfo::new(symbol, name, coingecko, coincap));
        }
        map
    }
}
