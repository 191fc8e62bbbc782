//! Market data endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::split_symbols;
use crate::AppState;

const DEFAULT_HISTORY_DAYS: u32 = 7;
const MAX_HISTORY_DAYS: u32 = 365;
const DEFAULT_MOVERS: usize = 10;

/// `?symbols=BTC,ETH`; empty means the configured watchlist
#[derive(Debug, Deserialize)]
pub struct SymbolsQuery {
    pub symbols: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    fn days(&self) -> u32 {
        self.days
            .unwrap_or(DEFAULT_HISTORY_DAYS)
            .clamp(1, MAX_HISTORY_DAYS)
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Current quotes
async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<SymbolsQuery>,
) -> impl IntoResponse {
    let mut symbols = split_symbols(query.symbols.as_deref());
    if symbols.is_empty() {
        symbols = state.dashboard.config().watchlist.clone();
    }
    let prices = state.dashboard.get_current_prices(&symbols).await;
    (StatusCode::OK, Json(prices))
}

/// Price history for one symbol
async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DaysQuery>,
) -> impl IntoResponse {
    let history = state
        .dashboard
        .get_historical_data(&symbol.to_uppercase(), query.days())
        .await;
    (StatusCode::OK, Json(history))
}

async fn get_movers(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let movers = state
        .dashboard
        .get_top_movers(query.limit.unwrap_or(DEFAULT_MOVERS))
        .await;
    (StatusCode::OK, Json(movers))
}

async fn get_trending(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.dashboard.get_trending().await))
}

/// Aggregated overview across prices, sentiment, movers, trending and news
async fn get_overview(
    State(state): State<AppState>,
    Query(query): Query<SymbolsQuery>,
) -> impl IntoResponse {
    let symbols = split_symbols(query.symbols.as_deref());
    let overview = state.dashboard.get_market_overview(&symbols).await;
    (StatusCode::OK, Json(overview))
}

/// Everything known about one asset
async fn get_asset(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DaysQuery>,
) -> impl IntoResponse {
    let data = state
        .dashboard
        .get_complete_asset_data(&symbol.to_uppercase(), query.days())
        .await;
    (StatusCode::OK, Json(data))
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/prices", get(get_prices))
        .route("/history/{symbol}", get(get_history))
        .route("/movers", get(get_movers))
        .route("/trending", get(get_trending))
        .route("/overview", get(get_overview))
        .route("/assets/{symbol}", get(get_asset))
}
