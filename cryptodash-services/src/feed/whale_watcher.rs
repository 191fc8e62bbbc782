//! Whale transaction watcher
//!
//! Polls the whale service at a fixed interval and pushes each transaction
//! to subscribers once. Every poll covers the full lookback window; ids
//! already delivered are remembered in a bounded window and skipped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use cryptodash_core::WhaleTransaction;

use super::manager::FeedError;
use super::subscription::{Callback, SubscriptionId, SubscriptionRegistry};
use super::BackgroundTask;
use crate::config::WhaleConfig;
use crate::whale_service::WhaleService;

/// Most recently delivered ids, oldest evicted first
#[derive(Debug)]
struct RecentIds {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// True when `id` had not been seen
    fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

pub struct WhaleWatcher {
    service: Arc<WhaleService>,
    config: WhaleConfig,
    subscriptions: Arc<SubscriptionRegistry<WhaleTransaction>>,
    task: Mutex<Option<BackgroundTask>>,
}

impl WhaleWatcher {
    pub fn new(service: Arc<WhaleService>, config: WhaleConfig) -> Self {
        Self {
            service,
            config,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            task: Mutex::new(None),
        }
    }

    /// Register a callback; an empty symbol list receives every transaction
    pub fn subscribe<F>(&self, symbols: &[String], callback: F) -> SubscriptionId
    where
        F: Fn(&WhaleTransaction) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(symbols, callback)
    }

    pub fn subscribe_arc(
        &self,
        symbols: &[String],
        callback: Callback<WhaleTransaction>,
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

    pub fn start(&self) -> Result<(), FeedError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(BackgroundTask::is_running) {
            return Err(FeedError::AlreadyRunning);
        }

        info!(
            "[WhaleWatcher] Polling every {:?} for transfers >= ${}",
            self.config.poll_interval,
            self.service.min_value_usd()
        );
        let service = Arc::clone(&self.service);
        let subscriptions = Arc::clone(&self.subscriptions);
        let config = self.config;
        *task = Some(BackgroundTask::spawn(move |shutdown| {
            watch_loop(service, subscriptions, config, shutdown)
        }));
        Ok(())
    }

    pub async fn stop(&self) {
        let running = self.task.lock().take();
        if let Some(running) = running {
            running.stop("WhaleWatcher").await;
            info!("[WhaleWatcher] Stopped");
        }
    }
}

impl std::fmt::Debug for WhaleWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhaleWatcher")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

async fn watch_loop(
    service: Arc<WhaleService>,
    subscriptions: Arc<SubscriptionRegistry<WhaleTransaction>>,
    config: WhaleConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let lookback =
        chrono::Duration::from_std(config.lookback).unwrap_or_else(|_| chrono::Duration::hours(1));
    let mut recent = RecentIds::new(config.dedupe_window);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let since = Utc::now() - lookback;
        let transactions = tokio::select! {
            _ = shutdown.changed() => break,
            txs = service.get_recent_transactions(since) => txs,
        };

        // oldest first so subscribers see them in chronological order
        let mut delivered = 0;
        for tx in transactions.iter().rev() {
            if recent.insert(&tx.id) {
                subscriptions.dispatch(tx);
                delivered += 1;
            }
        }
        debug!(
            "[WhaleWatcher] {} new of {} transaction(s), {} remembered",
            delivered,
            transactions.len(),
            recent.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, provider};
    use cryptodash_core::{Capability, ProviderId};
    use cryptodash_providers::{ProviderRegistry, ScriptedTransport};
    use std::time::Duration;

    #[test]
    fn test_recent_ids_bounded() {
        let mut recent = RecentIds::new(2);
        assert!(recent.insert("a"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(recent.insert("c"));
        assert_eq!(recent.len(), 2);
        // "a" was evicted, so it counts as new again
        assert!(recent.insert("a"));
        assert!(!recent.insert("c"));
    }

    fn blockchair_body() -> String {
        let now = Utc::now();
        let at = |minutes: i64| {
            (now - chrono::Duration::minutes(minutes))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        };
        format!(
            r#"{{"data":[
                {{"hash":"new","time":"{}","output_total":5000000000,"output_total_usd":3100000}},
                {{"hash":"old","time":"{}","output_total":2000000000,"output_total_usd":1240000}}
            ]}}"#,
            at(5),
            at(20)
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_transaction_delivered_once() {
        let transport = ScriptedTransport::new();
        transport.ok("bc.test/bitcoin/transactions", blockchair_body());
        let registry = ProviderRegistry::new().with(
            Capability::WhaleTracking,
            provider(ProviderId::Blockchair, "bc.test", 1),
        );
        let service = Arc::new(WhaleService::new(engine(registry, &transport), 500_000));
        let watcher = WhaleWatcher::new(
            service,
            WhaleConfig {
                poll_interval: Duration::from_secs(60),
                ..WhaleConfig::default()
            },
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        watcher.subscribe(&[], move |tx: &WhaleTransaction| sink.lock().push(tx.hash.clone()));

        watcher.start().unwrap();
        assert_eq!(watcher.start(), Err(FeedError::AlreadyRunning));
        tokio::time::sleep(Duration::from_secs(125)).await;
        watcher.stop().await;

        // three polls (0s, 60s, 120s), each transaction pushed once, oldest first
        assert_eq!(transport.call_count("bc.test"), 3);
        assert_eq!(*seen.lock(), vec!["old", "new"]);
        assert!(!watcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_scoped_subscription() {
        let transport = ScriptedTransport::new();
        transport.ok("bc.test/bitcoin/transactions", blockchair_body());
        let registry = ProviderRegistry::new().with(
            Capability::WhaleTracking,
            provider(ProviderId::Blockchair, "bc.test", 1),
        );
        let service = Arc::new(WhaleService::new(engine(registry, &transport), 500_000));
        let watcher = WhaleWatcher::new(service, WhaleConfig::default());

        let eth = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&eth);
        watcher.subscribe(&["ETH".to_string()], move |_: &WhaleTransaction| {
            *sink.lock() += 1
        });

        watcher.start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        watcher.stop().await;

        assert_eq!(transport.call_count("bc.test"), 1);
        assert_eq!(*eth.lock(), 0);
    }
}
