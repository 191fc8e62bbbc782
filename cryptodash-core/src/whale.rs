//! Large on-chain transfer data

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single large transfer reported by a whale tracking provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleTransaction {
    /// Provider-stable identifier, used for de-duplication
    pub id: String,
    pub blockchain: String,
    pub symbol: String,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}
