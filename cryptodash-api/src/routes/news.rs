//! News endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use cryptodash_core::FetchError;

use super::error_response;
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Query parameters for latest news
#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub limit: Option<usize>,
}

/// Query parameters for news search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// RFC 3339
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// GET /api/news
async fn get_news(
    State(state): State<AppState>,
    Query(query): Query<NewsQuery>,
) -> impl IntoResponse {
    let articles = state
        .dashboard
        .get_latest_news(clamp_limit(query.limit))
        .await;
    (StatusCode::OK, Json(articles))
}

/// GET /api/news/search?q=...
///
/// Unlike the aggregate endpoints this reports an outage instead of an
/// empty list, so clients can tell "no matches" apart.
async fn search_news(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let result = state
        .dashboard
        .try_search_news(&query.q, query.from, query.to, clamp_limit(query.limit))
        .await;

    match result {
        Ok(articles) => (StatusCode::OK, Json(articles)).into_response(),
        Err(e @ FetchError::InvalidQuery(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            warn!("News search for '{}' failed: {}", query.q, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// GET /api/news/{symbol}/sentiment
async fn get_news_and_sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> impl IntoResponse {
    let combined = state
        .dashboard
        .get_news_and_sentiment(&symbol.to_uppercase(), clamp_limit(query.limit))
        .await;
    (StatusCode::OK, Json(combined))
}

/// Create news routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/news", get(get_news))
        .route("/news/search", get(search_news))
        .route("/news/{symbol}/sentiment", get(get_news_and_sentiment))
}
