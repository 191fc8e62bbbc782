//! Live updates pushed to callbacks
//!
//! - [`FeedManager`]: streamed prices with reconnect and polling fallback
//! - [`WhaleWatcher`]: whale transactions by fixed-interval polling

mod manager;
mod subscription;
mod whale_watcher;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

pub use manager::{FeedError, FeedManager, SnapshotSource};
pub use subscription::{Callback, FeedEvent, SubscriptionId, SubscriptionRegistry};
pub use whale_watcher::WhaleWatcher;

/// A spawned worker and the switch that stops it
struct BackgroundTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    fn spawn<F>(worker: impl FnOnce(watch::Receiver<bool>) -> F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            shutdown,
            handle: tokio::spawn(worker(shutdown_rx)),
        }
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the worker without waiting for it to exit
    fn cancel(self) {
        let _ = self.shutdown.send(true);
    }

    async fn stop(self, component: &str) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("[{}] Task ended abnormally: {}", component, e);
        }
    }
}
