//! Callback subscriptions for live events
//!
//! Subscriptions are keyed by an opaque id and optionally scoped to a set of
//! symbols. Dispatch snapshots the matching callbacks before calling them, so
//! a callback may subscribe or unsubscribe without deadlocking the map.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use cryptodash_core::{PriceTick, WhaleTransaction};

/// Anything a live feed pushes to subscribers
pub trait FeedEvent: Send + Sync + 'static {
    /// Logical ticker the event is about
    fn symbol(&self) -> &str;
}

impl FeedEvent for PriceTick {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl FeedEvent for WhaleTransaction {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription<E> {
    /// Upper-cased tickers; `None` receives everything
    symbols: Option<HashSet<String>>,
    callback: Callback<E>,
}

impl<E: FeedEvent> Subscription<E> {
    fn matches(&self, event: &E) -> bool {
        match &self.symbols {
            None => true,
            Some(symbols) => symbols.contains(&event.symbol().to_uppercase()),
        }
    }
}

/// Registry of live callbacks for one kind of event
pub struct SubscriptionRegistry<E> {
    next_id: AtomicU64,
    subscriptions: DashMap<SubscriptionId, Subscription<E>>,
}

impl<E: FeedEvent> Default for SubscriptionRegistry<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: DashMap::new(),
        }
    }
}

impl<E: FeedEvent> SubscriptionRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events about any of `symbols`
    ///
    /// An empty symbol list subscribes to everything.
    pub fn subscribe<F>(&self, symbols: &[String], callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_arc(symbols, Arc::new(callback))
    }

    pub fn subscribe_arc(&self, symbols: &[String], callback: Callback<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let symbols: HashSet<String> = symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let scope = (!symbols.is_empty()).then_some(symbols);

        debug!("Subscription {} registered for {:?}", id, scope);
        self.subscriptions.insert(
            id,
            Subscription {
                symbols: scope,
                callback,
            },
        );
        id
    }

    /// Returns whether `id` was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Invoke every matching callback, returning how many ran
    pub fn dispatch(&self, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().matches(event))
            .map(|entry| Arc::clone(&entry.value().callback))
            .collect();

        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn clear(&self) {
        self.subscriptions.clear();
    }
}

impl<E> std::fmt::Debug for SubscriptionRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cryptodash_core::TickOrigin;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str) -> PriceTick {
        PriceTick {
            symbol: symbol.to_string(),
            price: dec!(1),
            timestamp: Utc::now(),
            origin: TickOrigin::Stream,
        }
    }

    #[test]
    fn test_symbol_scoping() {
        let registry = SubscriptionRegistry::<PriceTick>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry.subscribe(&["btc".to_string()], move |t: &PriceTick| {
            sink.lock().push(format!("btc-only:{}", t.symbol))
        });
        let sink = Arc::clone(&seen);
        registry.subscribe(&[], move |t: &PriceTick| {
            sink.lock().push(format!("all:{}", t.symbol))
        });

        assert_eq!(registry.dispatch(&tick("BTC")), 2);
        assert_eq!(registry.dispatch(&tick("ETH")), 1);

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec!["all:BTC", "all:ETH", "btc-only:BTC"]);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = SubscriptionRegistry::<PriceTick>::new();
        let first = registry.subscribe(&[], |_: &PriceTick| {});
        let second = registry.subscribe(&[], |_: &PriceTick| {});

        assert_ne!(first, second);
        assert!(registry.unsubscribe(first));
        assert!(!registry.unsubscribe(first));
        assert_eq!(registry.dispatch(&tick("SOL")), 1);
        assert_eq!(second.to_string(), "sub-2");
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let registry = Arc::new(SubscriptionRegistry::<PriceTick>::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let (inner, own_id) = (Arc::clone(&registry), Arc::clone(&slot));
        let id = registry.subscribe(&[], move |_: &PriceTick| {
            if let Some(id) = own_id.lock().take() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        assert_eq!(registry.dispatch(&tick("BTC")), 1);
        assert!(registry.is_empty());
    }
}
