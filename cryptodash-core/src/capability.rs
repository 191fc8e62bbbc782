//! Logical data capabilities served by upstream providers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical kind of data the dashboard fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Spot prices, history, movers
    MarketData,
    /// Headlines and article search
    News,
    /// Fear/greed and community sentiment
    Sentiment,
    /// Large on-chain transfers
    WhaleTracking,
    /// Block explorer lookups
    Blockchain,
}

impl Capability {
    /// All capabilities, in display order
    pub const ALL: [Capability; 5] = [
        Capability::MarketData,
        Capability::News,
        Capability::Sentiment,
        Capability::WhaleTracking,
        Capability::Blockchain,
    ];

    /// Stable identifier used in logs and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::MarketData => "market_data",
            Capability::News => "news",
            Capability::Sentiment => "sentiment",
            Capability::WhaleTracking => "whale_tracking",
            Capability::Blockchain => "blockchain",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "market_data" | "market" | "prices" => Ok(Capability::MarketData),
            "news" => Ok(Capability::News),
            "sentiment" => Ok(Capability::Sentiment),
            "whale_tracking" | "whale" | "whales" => Ok(Capability::WhaleTracking),
            "blockchain" | "explorer" => Ok(Capability::Blockchain),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("prices".parse::<Capability>(), Ok(Capability::MarketData));
        assert_eq!("Whale".parse::<Capability>(), Ok(Capability::WhaleTracking));
        assert!("weather".parse::<Capability>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for capability in Capability::ALL {
            let json = serde_json::to_string(&capability).unwrap();
            assert_eq!(json, format!("\"{}\"", capability));
        }
    }
}
