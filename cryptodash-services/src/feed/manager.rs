//! Live price feed manager
//!
//! Owns the streaming connection and its reconnect policy:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected (backoff, retry)
//!                     |                  \-> Closing (stop requested)
//!                     v
//!                  Polling  (retry budget spent; snapshots every poll
//!                            interval, stream re-probed every re-probe
//!                            interval until it answers)
//! ```
//!
//! Subscriptions live in the manager, not the connection, so they survive
//! reconnects and the switch to polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, OptionFuture};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cryptodash_core::{FeedState, FetchResult, MarketData, PriceTick, TickOrigin};
use cryptodash_providers::{
    AssetInfo, PriceBatch, PriceConnection, PriceStream, StreamError, SymbolMap,
};

use super::subscription::{Callback, SubscriptionId, SubscriptionRegistry};
use super::BackgroundTask;
use crate::config::FeedConfig;
use crate::market_service::MarketService;

/// Feed lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed is already running")]
    AlreadyRunning,

    #[error("Nothing to watch: empty symbol list")]
    EmptyWatchlist,
}

/// Where polling snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, symbols: &[String]) -> FetchResult<Vec<MarketData>>;
}

#[async_trait]
impl SnapshotSource for MarketService {
    async fn snapshot(&self, symbols: &[String]) -> FetchResult<Vec<MarketData>> {
        self.fetch_current_prices(symbols).await
    }
}

/// Live price feed with reconnect budget and polling fallback
///
/// [`start`](Self::start) spawns one background worker that owns the
/// connection. Callers only register callbacks and read the state.
///
/// ## Reconnect Budget
///
/// A refused connect, a connect that outlives `connect_timeout`, and a
/// session that closes before delivering anything each count as one
/// failure. Any delivered batch resets the count. Below
/// `reconnect_attempts` failures the worker waits `reconnect_backoff` and
/// retries.
///
/// ## Polling Mode
///
/// Once the budget is spent the feed reports [`FeedState::Polling`] and
/// serves snapshots from its [`SnapshotSource`] every `poll_interval`. The
/// stream is re-probed every `reprobe_interval` while polling continues;
/// the first successful re-probe resumes streaming.
pub struct FeedManager {
    stream: Arc<dyn PriceStream>,
    snapshots: Arc<dyn SnapshotSource>,
    symbols: Arc<SymbolMap>,
    config: FeedConfig,
    subscriptions: Arc<SubscriptionRegistry<PriceTick>>,
    state: Arc<watch::Sender<FeedState>>,
    task: Mutex<Option<BackgroundTask>>,
}

impl FeedManager {
    pub fn new(
        stream: Arc<dyn PriceStream>,
        snapshots: Arc<dyn SnapshotSource>,
        symbols: Arc<SymbolMap>,
        config: FeedConfig,
    ) -> Self {
        let (state, _) = watch::channel(FeedState::Disconnected);
        Self {
            stream,
            snapshots,
            symbols,
            config,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn watch_state(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Register a tick callback; an empty symbol list receives every tick
    pub fn subscribe<F>(&self, symbols: &[String], callback: F) -> SubscriptionId
    where
        F: Fn(&PriceTick) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(symbols, callback)
    }

    pub fn subscribe_arc(
        &self,
        symbols: &[String],
        callback: Callback<PriceTick>,
    ) -> SubscriptionId {
        self.subscriptions.subscribe_arc(symbols, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(BackgroundTask::is_running)
    }

    /// Start streaming `watchlist` in the background
    pub fn start(&self, watchlist: &[String]) -> Result<(), FeedError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(BackgroundTask::is_running) {
            return Err(FeedError::AlreadyRunning);
        }

        let assets = self.symbols.resolve_all(watchlist);
        if assets.is_empty() {
            return Err(FeedError::EmptyWatchlist);
        }

        let tickers: Vec<String> = assets.iter().map(|a| a.symbol.clone()).collect();
        info!("[Feed] Starting live feed for {:?}", tickers);

        *task = Some(BackgroundTask::spawn(|shutdown| {
            FeedWorker {
                stream: Arc::clone(&self.stream),
                snapshots: Arc::clone(&self.snapshots),
                assets,
                tickers,
                config: self.config,
                subscriptions: Arc::clone(&self.subscriptions),
                state: Arc::clone(&self.state),
                shutdown,
            }
            .run()
        }));
        Ok(())
    }

    /// Close the connection and wait for the background task to finish
    pub async fn stop(&self) {
        let running = self.task.lock().take();
        let Some(running) = running else {
            return;
        };

        running.stop("Feed").await;
        self.state.send_replace(FeedState::Disconnected);
        info!("[Feed] Stopped");
    }

    /// Ask the background task to stop without awaiting it
    ///
    /// For synchronous callers; the worker reports `Disconnected` on exit.
    pub fn halt(&self) {
        if let Some(running) = self.task.lock().take() {
            running.cancel();
            info!("[Feed] Halt requested");
        }
    }
}

impl std::fmt::Debug for FeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

type ConnectResult = Result<Box<dyn PriceConnection>, StreamError>;

/// `stream.connect` bounded by `limit`; elapsing is a failed connection
async fn connect_within(
    stream: Arc<dyn PriceStream>,
    assets: Vec<AssetInfo>,
    limit: Duration,
) -> ConnectResult {
    match tokio::time::timeout(limit, stream.connect(&assets)).await {
        Ok(result) => result,
        Err(_) => Err(StreamError::Timeout(limit)),
    }
}

enum PumpExit {
    Shutdown,
    Closed { delivered: bool },
}

struct FeedWorker {
    stream: Arc<dyn PriceStream>,
    snapshots: Arc<dyn SnapshotSource>,
    assets: Vec<AssetInfo>,
    tickers: Vec<String>,
    config: FeedConfig,
    subscriptions: Arc<SubscriptionRegistry<PriceTick>>,
    state: Arc<watch::Sender<FeedState>>,
    shutdown: watch::Receiver<bool>,
}

impl FeedWorker {
    async fn run(mut self) {
        let mut failures: u32 = 0;
        let mut ready: Option<Box<dyn PriceConnection>> = None;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let conn = match ready.take() {
                Some(conn) => conn,
                None => {
                    self.set_state(FeedState::Connecting);
                    let connecting = self.connect();
                    let attempt = tokio::select! {
                        _ = self.shutdown.changed() => break,
                        attempt = connecting => attempt,
                    };
                    match attempt {
                        Ok(conn) => conn,
                        Err(e) => {
                            failures += 1;
                            warn!(
                                "[Feed] Connection attempt {}/{} failed: {}",
                                failures, self.config.reconnect_attempts, e
                            );
                            match self.recover(failures).await {
                                Some(reprobed) => {
                                    if reprobed.is_some() {
                                        failures = 0;
                                    }
                                    ready = reprobed;
                                    continue;
                                }
                                None => break,
                            }
                        }
                    }
                }
            };

            self.set_state(FeedState::Connected);
            info!("[Feed] Connected");

            match self.pump(conn).await {
                PumpExit::Shutdown => break,
                PumpExit::Closed { delivered } => {
                    failures = if delivered { 0 } else { failures + 1 };
                    warn!(
                        "[Feed] Connection closed ({} consecutive failure(s))",
                        failures
                    );
                }
            }

            match self.recover(failures).await {
                Some(reprobed) => {
                    if reprobed.is_some() {
                        failures = 0;
                    }
                    ready = reprobed;
                }
                None => break,
            }
        }

        self.set_state(FeedState::Closing);
        self.set_state(FeedState::Disconnected);
        debug!("[Feed] Worker exited");
    }

    /// Wait out the backoff, or poll once the retry budget is spent
    ///
    /// `None` means shutdown was requested. `Some(Some(conn))` carries a
    /// connection opened by a successful re-probe.
    async fn recover(&mut self, failures: u32) -> Option<Option<Box<dyn PriceConnection>>> {
        if failures >= self.config.reconnect_attempts {
            warn!(
                "[Feed] {} consecutive failures, falling back to polling",
                failures
            );
            return self.poll().await.map(Some);
        }

        self.set_state(FeedState::Disconnected);
        tokio::select! {
            _ = self.shutdown.changed() => None,
            _ = tokio::time::sleep(self.config.reconnect_backoff) => Some(None),
        }
    }

    /// Deliver ticks from `conn` until it closes or shutdown is requested
    async fn pump(&mut self, mut conn: Box<dyn PriceConnection>) -> PumpExit {
        let mut delivered = false;
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    self.set_state(FeedState::Closing);
                    conn.close().await;
                    return PumpExit::Shutdown;
                }
                next = conn.next_batch() => match next {
                    Some(Ok(batch)) => {
                        delivered = true;
                        self.deliver(batch, TickOrigin::Stream);
                    }
                    Some(Err(e)) => {
                        warn!("[Feed] Stream error: {}", e);
                        conn.close().await;
                        return PumpExit::Closed { delivered };
                    }
                    None => return PumpExit::Closed { delivered },
                }
            }
        }
    }

    /// Serve snapshots until a re-probe connects or shutdown is requested
    async fn poll(&mut self) -> Option<Box<dyn PriceConnection>> {
        self.set_state(FeedState::Polling);

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reprobe = tokio::time::interval_at(
            Instant::now() + self.config.reprobe_interval,
            self.config.reprobe_interval,
        );
        reprobe.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // in flight alongside polling so a stalled handshake never blocks ticks
        let mut probe: Option<BoxFuture<'static, ConnectResult>> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = poll.tick() => self.poll_once().await,
                _ = reprobe.tick(), if probe.is_none() => {
                    debug!("[Feed] Re-probing stream");
                    probe = Some(self.connect());
                }
                Some(result) = OptionFuture::from(probe.as_mut()), if probe.is_some() => {
                    probe = None;
                    match result {
                        Ok(conn) => {
                            info!("[Feed] Stream reachable again, leaving polling");
                            return Some(conn);
                        }
                        Err(e) => debug!("[Feed] Re-probe failed: {}", e),
                    }
                }
            }
        }
    }

    fn connect(&self) -> BoxFuture<'static, ConnectResult> {
        connect_within(
            Arc::clone(&self.stream),
            self.assets.clone(),
            self.config.connect_timeout,
        )
        .boxed()
    }

    async fn poll_once(&self) {
        match self.snapshots.snapshot(&self.tickers).await {
            Ok(quotes) => {
                debug!("[Feed] Polled {} quote(s)", quotes.len());
                let batch: PriceBatch = quotes.into_iter().map(|q| (q.symbol, q.price)).collect();
                self.deliver(batch, TickOrigin::Snapshot);
            }
            Err(e) => warn!("[Feed] Snapshot poll failed: {}", e),
        }
    }

    fn deliver(&self, batch: PriceBatch, origin: TickOrigin) {
        let timestamp = Utc::now();
        for (symbol, price) in batch {
            let tick = PriceTick {
                symbol,
                price,
                timestamp,
                origin,
            };
            self.subscriptions.dispatch(&tick);
        }
    }

    fn set_state(&self, state: FeedState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("[Feed] {:?} -> {:?}", previous, state);
        }
    }
}
