//! Whale Alert adapter
//!
//! Requires an API key; without a credential no request is built.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{ProviderConfig, ProviderError, WhaleTransaction};

use crate::convert::{from_body, from_unix_secs};
use crate::request::RequestTemplate;

/// Whale Alert rejects `start` older than one hour on the free tier
const MAX_LOOKBACK_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct Response {
    result: String,
    message: Option<String>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    blockchain: String,
    symbol: String,
    id: Option<String>,
    hash: String,
    from: Option<Party>,
    to: Option<Party>,
    timestamp: i64,
    amount: Decimal,
    amount_usd: Decimal,
}

#[derive(Debug, Deserialize)]
struct Party {
    address: Option<String>,
    owner: Option<String>,
}

impl Party {
    /// Known owner name, else the raw address
    fn label(self) -> Option<String> {
        self.owner
            .filter(|o| !o.is_empty() && o != "unknown")
            .or(self.address)
    }
}

pub fn transactions_request(
    provider: &ProviderConfig,
    min_value_usd: u64,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<RequestTemplate> {
    if !provider.auth.has_credential() {
        return None;
    }
    let start = since.timestamp().max(now.timestamp() - MAX_LOOKBACK_SECS);
    Some(
        RequestTemplate::new("/transactions")
            .query("min_value", min_value_usd)
            .query("start", start)
            .query("limit", 100),
    )
}

pub fn parse_transactions(
    body: &str,
    source: &str,
) -> Result<Vec<WhaleTransaction>, ProviderError> {
    let response: Response = from_body(body, "whale-alert transactions")?;
    if response.result != "success" {
        return Err(ProviderError::parse(format!(
            "whale-alert error: {}",
            response.message.unwrap_or(response.result)
        )));
    }

    Ok(response
        .transactions
        .into_iter()
        .filter_map(|tx| {
            let timestamp = from_unix_secs(tx.timestamp)?;
            let id = tx
                .id
                .unwrap_or_else(|| format!("{}-{}", tx.blockchain, tx.hash));
            Some(WhaleTransaction {
                id: format!("whale-alert-{}", id),
                blockchain: tx.blockchain,
                symbol: tx.symbol.to_uppercase(),
                amount: tx.amount,
                amount_usd: tx.amount_usd,
                from: tx.from.and_then(Party::label),
                to: tx.to.and_then(Party::label),
                hash: tx.hash,
                timestamp,
                source: source.to_string(),
            })
        })
        .collect())
}
