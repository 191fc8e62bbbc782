//! Upstream provider plumbing for the crypto dashboard
//!
//! This crate knows how to talk to each third-party API:
//! - Registry: capability to priority-ordered provider chains
//! - Requests: endpoint templates and credential application
//! - Transport: the HTTP seam (reqwest in production, scripted in tests)
//! - Adapters: one module per provider with request builders and parsers
//! - Stream: the CoinCap live price websocket

pub mod alternative_me;
pub mod binance;
pub mod blockchair;
pub mod coincap;
pub mod coingecko;
mod convert;
pub mod cryptocompare;
pub mod cryptopanic;
pub mod etherscan;
pub mod newsapi;
pub mod registry;
pub mod request;
pub mod stream;
pub mod symbols;
pub mod transport;
pub mod whale_alert;

pub use coingecko::CommunityStats;
pub use newsapi::NewsQuery;
pub use registry::{ProviderKeys, ProviderRegistry};
pub use request::{ProviderRequest, RequestTemplate};
pub use stream::{
    CoinCapStream, PriceBatch, PriceConnection, PriceStream, ScriptedSession, ScriptedStream,
    StreamError,
};
pub use symbols::{AssetInfo, SymbolMap};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, ScriptedTransport};
