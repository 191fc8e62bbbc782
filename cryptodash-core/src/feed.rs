//! Live feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Connection state of the live price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnect budget exhausted; serving periodic snapshots
    Polling,
    Closing,
}

impl FeedState {
    /// Whether ticks are currently being delivered by any means
    pub fn is_live(&self) -> bool {
        matches!(self, FeedState::Connected | FeedState::Polling)
    }
}

/// Where a tick came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOrigin {
    Stream,
    Snapshot,
}

/// One live price update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Logical ticker, e.g. "BTC"
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub origin: TickOrigin,
}
