//! Etherscan adapter (Ethereum mainnet balances)

use rust_decimal::Decimal;
use serde::Deserialize;

use cryptodash_core::{AddressBalance, ProviderError};

use crate::convert::from_body;
use crate::request::RequestTemplate;

const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    message: String,
    result: String,
}

/// `None` for anything but Ethereum
pub fn balance_request(chain: &str, address: &str) -> Option<RequestTemplate> {
    if chain != "ethereum" {
        return None;
    }
    Some(
        RequestTemplate::new("/api")
            .query("module", "account")
            .query("action", "balance")
            .query("address", address)
            .query("tag", "latest"),
    )
}

pub fn parse_balance(body: &str, address: &str, source: &str) -> Result<AddressBalance, ProviderError> {
    let response: Response = from_body(body, "etherscan balance")?;
    if response.status != "1" {
        return Err(ProviderError::parse(format!(
            "etherscan error: {} ({})",
            response.message, response.result
        )));
    }

    let wei: i128 = response
        .result
        .trim()
        .parse()
        .map_err(|_| ProviderError::parse(format!("etherscan: bad wei amount '{}'", response.result)))?;
    let balance = Decimal::try_from_i128_with_scale(wei, WEI_DECIMALS)
        .map_err(|e| ProviderError::parse(format!("etherscan: {}", e)))?
        .normalize();

    Ok(AddressBalance {
        chain: "ethereum".to_string(),
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
    fn test_only_ethereum() {
        assert!(balance_request("bitcoin", "1A1z").is_none());
        let template = balance_request("ethereum", "0xde0b").unwrap();
        assert_eq!(template.path, "/api");
        assert!(template
            .query
            .contains(&("address".to_string(), "0xde0b".to_string())));
    }

    #[test]
    fn test_parse_balance() {
        let body = r#"{"status":"1","message":"OK","result":"40891626854930000000000"}"#;
        let balance = parse_balance(body, "0xde0b", "etherscan").unwrap();
        assert_eq!(balance.balance, dec!(40891.62685493));
    }

    #[test]
    fn test_notok_status() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Invalid address format"}"#;
        assert_eq!(
            parse_balance(body, "x", "etherscan").unwrap_err(),
            ProviderError::parse("etherscan error: NOTOK (Invalid address format)")
        );
    }
}
