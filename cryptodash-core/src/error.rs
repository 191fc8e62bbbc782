//! Error types for upstream fetching

use thiserror::Error;

use crate::Capability;

/// A single provider attempt failed
///
/// Never propagated past the fallback engine; it is recorded and the next
/// provider is tried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Network error: {0}")]
    Network(String),

    /// 2xx response with an unexpected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local token bucket had no budget left
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        ProviderError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        ProviderError::Parse(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ProviderError::InvalidRequest(msg.into())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// Errors surfaced to domain services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Every provider for the capability failed or timed out
    #[error("All {attempted} provider(s) for {capability} exhausted{}", describe_last(.last_error))]
    AllProvidersExhausted {
        capability: Capability,
        attempted: usize,
        last_error: Option<ProviderError>,
    },

    /// The query itself is unusable (e.g. unknown symbol)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl FetchError {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        FetchError::InvalidQuery(msg.into())
    }

    /// Last provider error, if any provider was attempted
    pub fn last_error(&self) -> Option<&ProviderError> {
        match self {
            FetchError::AllProvidersExhausted { last_error, .. } => last_error.as_ref(),
            FetchError::InvalidQuery(_) => None,
        }
    }
}

fn describe_last(last_error: &Option<ProviderError>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(", last error: {}", e))
        .unwrap_or_default()
}

/// Result type alias for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_includes_last_error() {
        let err = FetchError::AllProvidersExhausted {
            capability: Capability::News,
            attempted: 2,
            last_error: Some(ProviderError::http(503, "unavailable")),
        };
        assert_eq!(
            err.to_string(),
            "All 2 provider(s) for news exhausted, last error: HTTP status 503: unavailable"
        );

        let err = FetchError::AllProvidersExhausted {
            capability: Capability::Sentiment,
            attempted: 0,
            last_error: None,
        };
        assert_eq!(err.to_string(), "All 0 provider(s) for sentiment exhausted");
    }

    #[test]
    fn test_serde_error_is_parse_error() {
        let err: ProviderError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, ProviderError::Parse(_)));
    }
}
