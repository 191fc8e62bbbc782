//! Live price stream transport
//!
//! A [`PriceStream`] opens connections; a [`PriceConnection`] yields batches
//! of `(symbol, price)` updates until the server closes it. The feed manager
//! owns reconnect policy; nothing here retries.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::coincap;
use crate::symbols::AssetInfo;

/// Stream transport failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Stream protocol error: {0}")]
    Protocol(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
}

/// One batch of price updates, symbol is the logical ticker
pub type PriceBatch = Vec<(String, Decimal)>;

#[async_trait]
pub trait PriceConnection: Send {
    /// Next batch; `None` once the connection has closed
    async fn next_batch(&mut self) -> Option<Result<PriceBatch, StreamError>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait PriceStream: Send + Sync {
    async fn connect(
        &self,
        assets: &[AssetInfo],
    ) -> Result<Box<dyn PriceConnection>, StreamError>;
}

/// CoinCap `wss://ws.coincap.io/prices` client
#[derive(Debug, Clone, Default)]
pub struct CoinCapStream {
    /// Overrides the public endpoint, e.g. for a local relay
    pub url_override: Option<String>,
}

impl CoinCapStream {
    pub fn new() -> Self {
        Self::default()
    }
}

struct CoinCapConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    assets: Vec<AssetInfo>,
}

#[async_trait]
impl PriceStream for CoinCapStream {
    async fn connect(
        &self,
        assets: &[AssetInfo],
    ) -> Result<Box<dyn PriceConnection>, StreamError> {
        let url = match &self.url_override {
            Some(base) => format!(
                "{}?assets={}",
                base,
                assets
                    .iter()
                    .map(|a| a.coincap_id.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            None => coincap::price_stream_url(assets),
        };
        debug!("[CoinCapStream] Connecting to {}", url);

        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        Ok(Box::new(CoinCapConnection {
            socket,
            assets: assets.to_vec(),
        }))
    }
}

#[async_trait]
impl PriceConnection for CoinCapConnection {
    async fn next_batch(&mut self) -> Option<Result<PriceBatch, StreamError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => {
                    match coincap::parse_price_message(text.as_str(), &self.assets) {
                        Ok(batch) if batch.is_empty() => continue,
                        Ok(batch) => return Some(Ok(batch)),
                        Err(e) => {
                            warn!("[CoinCapStream] Skipping malformed message: {}", e);
                            continue;
                        }
                    }
                }
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.socket.send(Message::Pong(data)).await {
                        return Some(Err(StreamError::Protocol(e.to_string())));
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!("[CoinCapStream] Server closed connection: {:?}", frame);
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(StreamError::Protocol(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!("[CoinCapStream] Close handshake failed: {}", e);
        }
    }
}

/// What one scripted connection attempt does
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedSession {
    /// `connect` fails
    Refuse(String),
    /// Deliver each batch `interval` apart, then close
    Deliver {
        batches: Vec<PriceBatch>,
        interval: Duration,
    },
    /// Stay open without sending anything
    Idle,
    /// `connect` never completes
    Stall,
}

/// In-memory [`PriceStream`] for tests
///
/// Connection attempts consume queued sessions in order; once the queue is
/// empty every attempt plays the fallback session (refuse by default).
#[derive(Debug, Clone)]
pub struct ScriptedStream {
    queue: Arc<Mutex<VecDeque<ScriptedSession>>>,
    fallback: Arc<Mutex<ScriptedSession>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl Default for ScriptedStream {
    fn default() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(ScriptedSession::Refuse(
                "scripted stream refused".to_string(),
            ))),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, session: ScriptedSession) -> &Self {
        self.queue.lock().push_back(session);
        self
    }

    /// Session played once the queue is drained
    pub fn otherwise(&self, session: ScriptedSession) -> &Self {
        *self.fallback.lock() = session;
        self
    }

    /// When each connection attempt was made
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl PriceStream for ScriptedStream {
    async fn connect(
        &self,
        _assets: &[AssetInfo],
    ) -> Result<Box<dyn PriceConnection>, StreamError> {
        self.attempts.lock().push(Instant::now());
        let session = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        match session {
            ScriptedSession::Refuse(reason) => Err(StreamError::Connect(reason)),
            ScriptedSession::Deliver { batches, interval } => Ok(Box::new(ScriptedConnection {
                batches: batches.into(),
                interval,
                idle: false,
            })),
            ScriptedSession::Idle => Ok(Box::new(ScriptedConnection {
                batches: VecDeque::new(),
                interval: Duration::ZERO,
                idle: true,
            })),
            ScriptedSession::Stall => std::future::pending().await,
        }
    }
}

struct ScriptedConnection {
    batches: VecDeque<PriceBatch>,
    interval: Duration,
    idle: bool,
}

#[async_trait]
impl PriceConnection for ScriptedConnection {
    async fn next_batch(&mut self) -> Option<Result<PriceBatch, StreamError>> {
        if self.idle {
            return std::future::pending().await;
        }
        let batch = self.batches.pop_front()?;
        tokio::time::sleep(self.interval).await;
        Some(Ok(batch))
    }

    async fn close(&mut self) {
        self.batches.clear();
        self.idle = false;
    }
}
