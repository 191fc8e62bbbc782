//! API route definitions

mod chain;
mod health;
mod market;
mod news;
mod sentiment;
pub mod ws;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(market::routes())
        .merge(news::routes())
        .merge(sentiment::routes())
        .merge(chain::routes())
        .merge(health::routes())
}

/// Create WebSocket routes (separate from API)
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}

/// `{"error": message}` with `status`
fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({
            "error": message.into()
        })),
    )
        .into_response()
}

/// Comma-separated tickers, upper-cased, blanks dropped
fn split_symbols(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbols() {
        assert_eq!(split_symbols(Some("btc, eth,,SOL ")), vec!["BTC", "ETH", "SOL"]);
        assert!(split_symbols(Some(" , ")).is_empty());
        assert!(split_symbols(None).is_empty());
    }
}
