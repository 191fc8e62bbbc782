//! Whale transaction service
//!
//! Always live: whale results are never cached, the watcher dedupes instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use cryptodash_core::{Capability, FetchResult, ProviderId, WhaleTransaction};
use cryptodash_providers::{blockchair, whale_alert};

use crate::engine::{unsupported, Endpoint, FallbackEngine};

/// Rows asked of explorers that page rather than filter by time
const EXPLORER_PAGE: usize = 50;

pub struct WhaleService {
    engine: Arc<FallbackEngine>,
    min_value_usd: u64,
}

impl WhaleService {
    pub fn new(engine: Arc<FallbackEngine>, min_value_usd: u64) -> Self {
        Self {
            engine,
            min_value_usd,
        }
    }

    pub fn min_value_usd(&self) -> u64 {
        self.min_value_usd
    }

    /// Transfers at or above the threshold since `since`, newest first
    #[instrument(skip(self))]
    pub async fn get_recent_transactions(&self, since: DateTime<Utc>) -> Vec<WhaleTransaction> {
        self.try_recent_transactions(since)
            .await
            .unwrap_or_else(|e| {
                warn!("[WhaleService] No whale data: {}", e);
                Vec::new()
            })
    }

    pub async fn try_recent_transactions(
        &self,
        since: DateTime<Utc>,
    ) -> FetchResult<Vec<WhaleTransaction>> {
        let sourced = self
            .engine
            .execute(
                Capability::WhaleTracking,
                &transactions_endpoint(self.min_value_usd, since),
            )
            .await?;

        let threshold = Decimal::from(self.min_value_usd);
        let mut transactions: Vec<WhaleTransaction> = sourced
            .value
            .into_iter()
            .filter(|tx| tx.amount_usd >= threshold && tx.timestamp >= since)
            .collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!(
            "[WhaleService] {} transaction(s) from {}",
            transactions.len(),
            sourced.provider
        );
        Ok(transactions)
    }
}

impl std::fmt::Debug for WhaleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhaleService")
            .field("min_value_usd", &self.min_value_usd)
            .finish()
    }
}

fn transactions_endpoint(
    min_value_usd: u64,
    since: DateTime<Utc>,
) -> Endpoint<Vec<WhaleTransaction>> {
    Endpoint::new(
        "transactions",
        move |provider| match provider.id {
            ProviderId::WhaleAlert => {
                whale_alert::transactions_request(provider, min_value_usd, since, Utc::now())
            }
            ProviderId::Blockchair => Some(blockchair::large_transactions_request(
                min_value_usd,
                EXPLORER_PAGE,
            )),
            _ => None,
        },
        |provider, body| match provider.id {
            ProviderId::WhaleAlert => whale_alert::parse_transactions(body, &provider.name),
            ProviderId::Blockchair => blockchair::parse_large_transactions(body, &provider.name),
            other => Err(unsupported(other, "whale transactions")),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, provider};
    use chrono::TimeZone;
    use cryptodash_core::ProviderAuth;
    use cryptodash_providers::{ProviderRegistry, ScriptedTransport};

    const BLOCKCHAIR: &str = r#"{"data":[
        {"hash":"aa","time":"2024-03-01 10:00:00","output_total":5000000000,"output_total_usd":3100000},
        {"hash":"bb","time":"2024-03-01 12:00:00","output_total":100000000,"output_total_usd":62000},
        {"hash":"cc","time":"2024-03-01 11:00:00","output_total":2000000000,"output_total_usd":1240000}
    ]}"#;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyless_whale_alert_skipped_for_blockchair() {
        let transport = ScriptedTransport::new();
        transport.ok("bc.test/bitcoin/transactions", BLOCKCHAIR);
        let registry = ProviderRegistry::new()
            .with(
                Capability::WhaleTracking,
                provider(ProviderId::WhaleAlert, "wa.test", 1),
            )
            .with(
                Capability::WhaleTracking,
                provider(ProviderId::Blockchair, "bc.test", 2),
            );
        let svc = WhaleService::new(engine(registry, &transport), 500_000);

        let txs = svc.get_recent_transactions(since()).await;
        let hashes: Vec<&str> = txs.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["cc", "aa"]);
        assert_eq!(transport.call_count("wa.test"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whale_alert_when_keyed() {
        let transport = ScriptedTransport::new();
        transport.ok(
            "wa.test/transactions",
            r#"{"result":"success","transactions":[
                {"blockchain":"ethereum","symbol":"eth","id":"1","hash":"0x1",
                 "timestamp":1709294400,"amount":1000,"amount_usd":3500000}]}"#,
        );
        let registry = ProviderRegistry::new().with(
            Capability::WhaleTracking,
            provider(ProviderId::WhaleAlert, "wa.test", 1)
                .with_auth(ProviderAuth::query_param("api_key", "k")),
        );
        let svc = WhaleService::new(engine(registry, &transport), 1_000_000);

        let txs = svc.try_recent_transactions(since()).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].id, "whale-alert-1");
        assert!(transport.calls()[0].contains("min_value=1000000"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncached() {
        let transport = ScriptedTransport::new();
        transport.ok("bc.test", BLOCKCHAIR);
        let registry = ProviderRegistry::new().with(
            Capability::WhaleTracking,
            provider(ProviderId::Blockchair, "bc.test", 1),
        );
        let svc = WhaleService::new(engine(registry, &transport), 500_000);

        svc.get_recent_transactions(since()).await;
        svc.get_recent_transactions(since()).await;
        assert_eq!(transport.calls().len(), 2);
    }
}
