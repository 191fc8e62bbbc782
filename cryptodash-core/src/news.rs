//! News data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Provider-scoped identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// Publisher name (e.g. "CoinDesk")
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Tickers the provider tagged the article with
    #[serde(default)]
    pub currencies: Vec<String>,
    /// Provider that served the article
    pub provider: String,
}

impl NewsArticle {
    /// Whether the article mentions `symbol` (ticker tag, or ticker/name in text)
    pub fn mentions(&self, symbol: &str, name: Option<&str>) -> bool {
        if self
            .currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(symbol))
        {
            return true;
        }

        let haystack = format!("{} {}", self.title, self.description).to_lowercase();
        let ticker = symbol.to_lowercase();
        let ticker_hit = haystack
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == ticker);

        ticker_hit || name.is_some_and(|n| haystack.contains(&n.to_lowercase()))
    }
}
