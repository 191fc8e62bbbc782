//! Crypto Dashboard API Server
//!
//! HTTP API server exposing the aggregated market, news, sentiment and
//! on-chain data layer, plus a WebSocket stream of live prices and whale
//! transfers.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use cryptodash_core::{PriceTick, WhaleTransaction};
use cryptodash_services::{Dashboard, DashboardConfig, MonitoringCallbacks};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Live events fanned out to WebSocket clients
const LIVE_CHANNEL_CAPACITY: usize = 1024;

/// One message on the `/ws` stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    Price(PriceTick),
    Whale(WhaleTransaction),
}

impl LiveEvent {
    pub fn symbol(&self) -> &str {
        match self {
            LiveEvent::Price(tick) => &tick.symbol,
            LiveEvent::Whale(tx) => &tx.symbol,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub live: broadcast::Sender<LiveEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cryptodash_api=debug")),
        )
        .init();

    info!("Starting Crypto Dashboard API");

    let config = DashboardConfig::from_env()?;
    info!("Provider credentials: {:?}", config.keys);
    let dashboard = Arc::new(Dashboard::new(config)?);

    // Forward live updates to WebSocket clients
    let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
    let (price_tx, whale_tx) = (live.clone(), live.clone());
    let callbacks = MonitoringCallbacks::new()
        .on_price(move |tick: &PriceTick| {
            let _ = price_tx.send(LiveEvent::Price(tick.clone()));
        })
        .on_whale(move |tx: &WhaleTransaction| {
            let _ = whale_tx.send(LiveEvent::Whale(tx.clone()));
        });
    if let Err(e) = dashboard.start_real_time_monitoring(callbacks) {
        warn!("Real-time monitoring unavailable: {}", e);
    }

    let state = AppState {
        dashboard: Arc::clone(&dashboard),
        live,
    };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Build router
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(cors)
        .with_state(state);

    // Start server
    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.stop_real_time_monitoring().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
