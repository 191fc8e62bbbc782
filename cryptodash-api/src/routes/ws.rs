//! WebSocket route handler
//!
//! Streams live price ticks and whale transfers to connected clients. A
//! client may narrow the stream by sending `{"symbols": ["BTC", "ETH"]}`;
//! an empty list restores everything.

use std::collections::HashSet;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{AppState, LiveEvent};

/// Client-to-server filter message
#[derive(Debug, Deserialize)]
struct FilterRequest {
    symbols: Vec<String>,
}

/// Symbols a client is interested in; empty means all
#[derive(Debug, Default)]
struct SymbolFilter(HashSet<String>);

impl SymbolFilter {
    fn update(&mut self, request: FilterRequest) {
        self.0 = request
            .symbols
            .into_iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    fn matches(&self, event: &LiveEvent) -> bool {
        self.0.is_empty() || self.0.contains(&event.symbol().to_uppercase())
    }
}

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.live.subscribe();
    let mut filter = SymbolFilter::default();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !filter.matches(&event) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize live event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagging, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<FilterRequest>(text.as_str()) {
                        Ok(request) => {
                            filter.update(request);
                            debug!("WebSocket filter updated: {:?}", filter);
                        }
                        Err(e) => debug!("Ignoring client message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }

    info!("WebSocket connection closed");
}
