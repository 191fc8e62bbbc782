//! Real-time monitoring through the dashboard facade
//!
//! Run with: cargo test -p cryptodash-services --test test_live_feed

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio::time::Instant;

use cryptodash_core::{Capability, FeedState, PriceTick, ProviderConfig, ProviderId, TickOrigin};
use cryptodash_providers::{ProviderRegistry, ScriptedSession, ScriptedStream, ScriptedTransport};
use cryptodash_services::{Dashboard, DashboardConfig, FeedConfig, MonitoringCallbacks};

const COINGECKO_MARKETS: &str = r#"[
    {"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":43100.0},
    {"id":"ethereum","symbol":"eth","name":"Ethereum","current_price":2310.0}
]"#;

fn dashboard(transport: &ScriptedTransport, stream: &ScriptedStream) -> Dashboard {
    let registry = ProviderRegistry::new().with(
        Capability::MarketData,
        ProviderConfig::new(ProviderId::CoinGecko, "https://cg.test", 1),
    );
    let config = DashboardConfig {
        watchlist: vec!["BTC".to_string(), "ETH".to_string()],
        feed: FeedConfig {
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            reprobe_interval: Duration::from_secs(60),
        },
        ..DashboardConfig::default()
    };
    Dashboard::with_parts(
        config,
        registry,
        Arc::new(transport.clone()),
        Arc::new(stream.clone()),
    )
}

fn recording() -> (Arc<Mutex<Vec<PriceTick>>>, MonitoringCallbacks) {
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&ticks);
    let callbacks =
        MonitoringCallbacks::new().on_price(move |tick: &PriceTick| sink.lock().push(tick.clone()));
    (ticks, callbacks)
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_stream_falls_back_to_polling() {
    let transport = ScriptedTransport::new();
    transport.ok("cg.test/coins/markets", COINGECKO_MARKETS);
    let stream = ScriptedStream::new();
    let dash = dashboard(&transport, &stream);
    let (ticks, callbacks) = recording();

    let started = Instant::now();
    dash.start_real_time_monitoring(callbacks).unwrap();
    tokio::time::sleep(Duration::from_secs(70)).await;

    // retries 2s apart, then only one re-probe per minute
    let offsets: Vec<u64> = stream
        .attempts()
        .iter()
        .map(|at| at.duration_since(started).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 2, 4, 64]);
    assert_eq!(dash.health_report().feed, FeedState::Polling);

    // polls at 4s, 34s and 64s, two quotes each, never from the cache
    let ticks = ticks.lock().clone();
    assert_eq!(ticks.len(), 6);
    assert!(ticks.iter().all(|t| t.origin == TickOrigin::Snapshot));
    assert_eq!(transport.call_count("cg.test/coins/markets"), 3);

    dash.stop_real_time_monitoring().await;
    assert_eq!(dash.feed().state(), FeedState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_stream_recovers_from_drops() {
    let transport = ScriptedTransport::new();
    let stream = ScriptedStream::new();
    stream.push(ScriptedSession::Refuse("handshake failed".to_string()));
    stream.push(ScriptedSession::Deliver {
        batches: vec![
            vec![("BTC".to_string(), dec!(43000))],
            vec![("ETH".to_string(), dec!(2300))],
        ],
        interval: Duration::from_millis(500),
    });
    stream.otherwise(ScriptedSession::Idle);
    let dash = dashboard(&transport, &stream);
    let (ticks, callbacks) = recording();

    dash.start_real_time_monitoring(callbacks).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let prices: Vec<_> = ticks.lock().iter().map(|t| t.price).collect();
    assert_eq!(prices, vec![dec!(43000), dec!(2300)]);
    // refused, delivered then closed, reconnected
    assert_eq!(stream.attempt_count(), 3);
    assert_eq!(dash.feed().state(), FeedState::Connected);
    assert!(transport.calls().is_empty());

    dash.stop_real_time_monitoring().await;
}
