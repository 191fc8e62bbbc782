//! On-chain endpoints: whale transfers and address balances

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::error_response;
use crate::AppState;

const DEFAULT_WHALE_HOURS: i64 = 1;
const MAX_WHALE_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct WhaleQuery {
    pub hours: Option<i64>,
}

/// GET /api/whales?hours=1
async fn get_whales(
    State(state): State<AppState>,
    Query(query): Query<WhaleQuery>,
) -> impl IntoResponse {
    let hours = query
        .hours
        .unwrap_or(DEFAULT_WHALE_HOURS)
        .clamp(1, MAX_WHALE_HOURS);
    let since = Utc::now() - Duration::hours(hours);
    let transactions = state.dashboard.get_whale_transactions(since).await;
    (StatusCode::OK, Json(transactions))
}

/// GET /api/balances/{chain}/{address}
async fn get_balance(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .dashboard
        .get_address_balance(&chain.to_lowercase(), &address)
        .await
    {
        Some(balance) => (StatusCode::OK, Json(balance)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("No balance available for {} on {}", address, chain),
        ),
    }
}

/// Create on-chain routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/whales", get(get_whales))
        .route("/balances/{chain}/{address}", get(get_balance))
}
