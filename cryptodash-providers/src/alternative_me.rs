//! Alternative.me Fear & Greed index

use serde::Deserialize;

use cryptodash_core::{FearGreedIndex, ProviderError};

use crate::convert::{from_body, from_unix_secs};
use crate::request::RequestTemplate;

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    timestamp: Option<String>,
}

pub fn fng_request() -> RequestTemplate {
    RequestTemplate::new("/fng/").query("limit", 1)
}

pub fn parse_fng(body: &str) -> Result<FearGreedIndex, ProviderError> {
    let response: FngResponse = from_body(body, "alternative.me fng")?;
    let entry = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::parse("alternative.me fng: empty data"))?;

    let value: u8 = entry
        .value
        .trim()
        .parse()
        .map_err(|_| ProviderError::parse(format!("alternative.me fng: bad value '{}'", entry.value)))?;
    if value > 100 {
        return Err(ProviderError::parse(format!(
            "alternative.me fng: value {} out of range",
            value
        )));
    }

    Ok(FearGreedIndex {
        value,
        classification: entry.value_classification,
        timestamp: entry
            .timestamp
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(from_unix_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fng() {
        let body = r#"{"name":"Fear and Greed Index","data":[{"value":"22","value_classification":"Extreme Fear",
            "timestamp":"1709251200","time_until_update":"3600"}],"metadata":{"error":null}}"#;
        let index = parse_fng(body).unwrap();
        assert_eq!(index.value, 22);
        assert_eq!(index.classification, "Extreme Fear");
        assert_eq!(index.timestamp.unwrap().timestamp(), 1709251200);
    }

    #[test]
    fn test_empty_data_is_parse_error() {
        assert!(matches!(
            parse_fng(r#"{"data":[]}"#),
            Err(ProviderError::Parse(_))
        ));
        assert!(parse_fng(r#"{"data":[{"value":"250","value_classification":"?"}]}"#).is_err());
    }
}
