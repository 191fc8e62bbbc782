//! Blockchair explorer adapter
//!
//! Used both as the secondary whale source (large Bitcoin transactions) and
//! for address balances on the chains it indexes.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{AddressBalance, ProviderError, WhaleTransaction};

use crate::convert::{from_body, parse_timestamp};
use crate::request::RequestTemplate;

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    data: Vec<TransactionRow>,
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    hash: String,
    time: String,
    output_total: Decimal,
    output_total_usd: Decimal,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    data: HashMap<String, DashboardEntry>,
}

#[derive(Debug, Deserialize)]
struct DashboardEntry {
    address: AddressSummary,
}

#[derive(Debug, Deserialize)]
struct AddressSummary {
    balance: Decimal,
}

/// Native unit decimals for the chains balances are served for
pub fn chain_decimals(chain: &str) -> Option<u32> {
    match chain {
        "bitcoin" | "bitcoin-cash" | "litecoin" | "dogecoin" | "dash" | "zcash" => Some(8),
        "ethereum" => Some(18),
        _ => None,
    }
}

fn to_native_units(raw: Decimal, decimals: u32) -> Option<Decimal> {
    raw.checked_div(Decimal::from(10u64.checked_pow(decimals)?))
        .map(|d| d.normalize())
}

/// Largest recent Bitcoin transactions above `min_value_usd`
pub fn large_transactions_request(min_value_usd: u64, limit: usize) -> RequestTemplate {
    RequestTemplate::new("/bitcoin/transactions")
        .query("q", format!("output_total_usd({}..)", min_value_usd))
        .query("s", "time(desc)")
        .query("limit", limit.clamp(1, 100))
}

pub fn parse_large_transactions(
    body: &str,
    source: &str,
) -> Result<Vec<WhaleTransaction>, ProviderError> {
    let response: TransactionsResponse = from_body(body, "blockchair transactions")?;

    Ok(response
        .data
        .into_iter()
        .filter_map(|row| {
            Some(WhaleTransaction {
                id: format!("blockchair-bitcoin-{}", row.hash),
                blockchain: "bitcoin".to_string(),
                symbol: "BTC".to_string(),
                amount: to_native_units(row.output_total, 8)?,
                amount_usd: row.output_total_usd,
                from: None,
                to: None,
                timestamp: parse_timestamp(&row.time)?,
                hash: row.hash,
                source: source.to_string(),
            })
        })
        .collect())
}

/// `None` for chains Blockchair balances are not served for
pub fn address_request(chain: &str, address: &str) -> Option<RequestTemplate> {
    chain_decimals(chain)?;
    Some(RequestTemplate::new(format!(
        "/{}/dashboards/address/{}",
        chain, address
    )))
}

pub fn parse_address(
    body: &str,
    chain: &str,
    address: &str,
    source: &str,
) -> Result<AddressBalance, ProviderError> {
    let decimals = chain_decimals(chain)
        .ok_or_else(|| ProviderError::invalid_request(format!("unsupported chain '{}'", chain)))?;
    let response: DashboardResponse = from_body(body, "blockchair address dashboard")?;
    let entry = response
        .data
        .into_values()
        .next()
        .ok_or_else(|| ProviderError::parse("blockchair: address missing from response"))?;
    let balance = to_native_units(entry.address.balance, decimals)
        .ok_or_else(|| ProviderError::parse("blockchair: balance out of range"))?;

    Ok(AddressBalance {
        chain: chain.to_string(),
        address: address.to_string(),
        balance,
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_large_transactions() {
        let body = r#"{"data":[{"block_id":830000,"id":9000,"hash":"ff00","time":"2024-03-01 12:00:00",
            "output_total":150000000000,"output_total_usd":100500000.5}],"context":{"code":200}}"#;
        let txs = parse_large_transactions(body, "blockchair").unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].id, "blockchair-bitcoin-ff00");
        assert_eq!(txs[0].amount, dec!(1500));
        assert_eq!(txs[0].amount_usd, dec!(100500000.5));
    }

    #[test]
    fn test_address_request_unsupported_chain() {
        assert!(address_request("solana", "abc").is_none());
        assert_eq!(
            address_request("bitcoin", "1A1z").unwrap().path,
            "/bitcoin/dashboards/address/1A1z"
        );
    }

    #[test]
    fn test_parse_ethereum_balance_from_string() {
        let body = r#"{"data":{"0xabc":{"address":{"type":"account","balance":"1500000000000000000"},"calls":[]}},"context":{}}"#;
        let balance = parse_address(body, "ethereum", "0xABC", "blockchair").unwrap();
        assert_eq!(balance.balance, dec!(1.5));
        assert_eq!(balance.address, "0xABC");
    }

    #[test]
    fn test_parse_bitcoin_balance() {
        let body = r#"{"data":{"1A1z":{"address":{"balance":5000000000}}}}"#;
        let balance = parse_address(body, "bitcoin", "1A1z", "blockchair").unwrap();
        assert_eq!(balance.balance, dec!(50));
    }
}
