//! Sentiment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::AppState;

async fn get_sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let sentiment = state.dashboard.get_sentiment(&symbol.to_uppercase()).await;
    (StatusCode::OK, Json(sentiment))
}

async fn get_fear_greed(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.dashboard.get_fear_greed().await))
}

/// Create sentiment routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sentiment/{symbol}", get(get_sentiment))
        .route("/fear-greed", get(get_fear_greed))
}
