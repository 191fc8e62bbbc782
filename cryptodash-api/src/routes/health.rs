//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use cryptodash_services::HealthReport;

use crate::AppState;

/// A capability below this success rate marks the service degraded
const DEGRADED_SUCCESS_RATE: f64 = 0.5;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    report: HealthReport,
}

/// Capabilities with no recent attempts are not held against the service
fn is_healthy(report: &HealthReport) -> bool {
    report
        .capabilities
        .values()
        .filter(|summary| summary.total_requests > 0)
        .all(|summary| summary.success_rate >= DEGRADED_SUCCESS_RATE)
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.dashboard.health_report();

    let (status, code) = if is_healthy(&report) {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            report,
        }),
    )
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
