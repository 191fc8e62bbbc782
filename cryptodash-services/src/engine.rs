//! Fallback request engine
//!
//! Given a capability and an [`Endpoint`], walks the capability's provider
//! chain in priority order until one provider answers with a parsable 2xx
//! response. Each attempt is bounded by a timeout and recorded in the
//! [`HealthTracker`]; a provider is never retried within one execution.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use cryptodash_core::{Capability, FetchError, ProviderConfig, ProviderError, ProviderId};
use cryptodash_providers::{HttpTransport, ProviderRegistry, RequestTemplate};

use crate::health::{AttemptRecord, HealthTracker};
use crate::rate_limiter::RateLimiters;

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

type BuildFn = dyn Fn(&ProviderConfig) -> Option<RequestTemplate> + Send + Sync;
type ParseFn<T> = dyn Fn(&ProviderConfig, &str) -> Result<T, ProviderError> + Send + Sync;

/// One request/parse pair for a query
///
/// `build` returns `None` when a provider has no equivalent of this
/// endpoint; such providers are skipped without counting as an attempt.
pub struct Endpoint<T> {
    name: String,
    build: Box<BuildFn>,
    parse: Box<ParseFn<T>>,
}

impl<T> Endpoint<T> {
    pub fn new(
        name: impl Into<String>,
        build: impl Fn(&ProviderConfig) -> Option<RequestTemplate> + Send + Sync + 'static,
        parse: impl Fn(&ProviderConfig, &str) -> Result<T, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            build: Box::new(build),
            parse: Box::new(parse),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> std::fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).finish()
    }
}

/// A parsed result and the provider that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub provider: String,
}

/// Priority-ordered fallback across the providers of a capability
///
/// Each call walks the registry's chain for one capability, lowest priority
/// number first, and returns the first parsed success tagged with the
/// provider that produced it.
///
/// ## Attempt Accounting
///
/// Every provider that was actually tried leaves exactly one
/// [`AttemptRecord`](crate::health::AttemptRecord) in the health tracker:
/// transport errors, non-2xx statuses, parse failures, timeouts and empty
/// rate-limit buckets all count as failed attempts. Providers whose
/// [`Endpoint`] has no equivalent request are skipped and leave no record.
///
/// ## Timeouts
///
/// The per-attempt timeout bounds one request plus its parse. A hung
/// provider costs at most that long before the next one is tried.
pub struct FallbackEngine {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn HttpTransport>,
    health: Arc<HealthTracker>,
    limiters: Arc<RateLimiters>,
    attempt_timeout: Duration,
}

impl FallbackEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn HttpTransport>,
        health: Arc<HealthTracker>,
        limiters: Arc<RateLimiters>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            health,
            limiters,
            attempt_timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Try each provider for `capability` until one succeeds
    pub async fn execute<T>(
        &self,
        capability: Capability,
        endpoint: &Endpoint<T>,
    ) -> Result<Sourced<T>, FetchError> {
        let mut attempted = 0usize;
        let mut last_error = None;

        for provider in self.registry.providers(capability) {
            let Some(template) = (endpoint.build)(provider) else {
                debug!(
                    "[Engine] {} has no '{}' endpoint, skipping",
                    provider.name, endpoint.name
                );
                continue;
            };
            attempted += 1;

            let started = Instant::now();
            let outcome = self.attempt(provider, &template, endpoint).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    self.health
                        .record(AttemptRecord::success(capability, &provider.name, duration_ms));
                    debug!(
                        "[Engine] {} '{}' served by {} in {}ms",
                        capability, endpoint.name, provider.name, duration_ms
                    );
                    return Ok(Sourced {
                        value,
                        provider: provider.name.clone(),
                    });
                }
                Err(e) => {
                    warn!(
                        "[Engine] {} '{}' failed on {} after {}ms: {}",
                        capability, endpoint.name, provider.name, duration_ms, e
                    );
                    self.health.record(AttemptRecord::failure(
                        capability,
                        &provider.name,
                        duration_ms,
                        e.to_string(),
                    ));
                    last_error = Some(e);
                }
            }
        }

        let error = FetchError::AllProvidersExhausted {
            capability,
            attempted,
            last_error,
        };
        info!("[Engine] {}", error);
        Err(error)
    }

    /// Try each endpoint shape in order, each over the full provider chain
    ///
    /// The error of the last shape is returned when every shape fails.
    pub async fn execute_shapes<T>(
        &self,
        capability: Capability,
        shapes: &[Endpoint<T>],
    ) -> Result<Sourced<T>, FetchError> {
        let mut last = FetchError::AllProvidersExhausted {
            capability,
            attempted: 0,
            last_error: None,
        };
        for shape in shapes {
            match self.execute(capability, shape).await {
                Ok(result) => return Ok(result),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    async fn attempt<T>(
        &self,
        provider: &ProviderConfig,
        template: &RequestTemplate,
        endpoint: &Endpoint<T>,
    ) -> Result<T, ProviderError> {
        if !self.limiters.try_acquire(provider) {
            return Err(ProviderError::RateLimited(format!(
                "{} request budget exhausted",
                provider.name
            )));
        }

        let request = template.resolve(provider)?;
        let response = tokio::time::timeout(self.attempt_timeout, self.transport.get(&request))
            .await
            .map_err(|_| ProviderError::Timeout {
                timeout_ms: self.attempt_timeout.as_millis() as u64,
            })??;

        if !response.is_success() {
            return Err(ProviderError::http(
                response.status,
                truncate(&response.body, 200),
            ));
        }

        (endpoint.parse)(provider, &response.body)
    }
}

impl std::fmt::Debug for FallbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEngine")
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

/// A 2xx answer with nothing usable in it counts as a failed attempt
pub(crate) fn non_empty<T>(items: Vec<T>, what: &str) -> Result<Vec<T>, ProviderError> {
    if items.is_empty() {
        return Err(ProviderError::parse(format!("no {} in response", what)));
    }
    Ok(items)
}

pub(crate) fn unsupported(provider: ProviderId, what: &str) -> ProviderError {
    ProviderError::invalid_request(format!("{} does not serve {}", provider, what))
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptodash_core::{ProviderId, RateLimit};
    use cryptodash_providers::ScriptedTransport;

    fn provider(name: &str, host: &str, priority: u32) -> ProviderConfig {
        ProviderConfig::new(ProviderId::CoinGecko, format!("https://{}", host), priority)
            .with_name(name)
    }

    fn engine(registry: ProviderRegistry, transport: &ScriptedTransport) -> FallbackEngine {
        let registry = Arc::new(registry);
        FallbackEngine::new(
            registry.clone(),
            Arc::new(transport.clone()),
            Arc::new(HealthTracker::default()),
            Arc::new(RateLimiters::from_registry(&registry)),
            DEFAULT_ATTEMPT_TIMEOUT,
        )
    }

    fn echo_endpoint() -> Endpoint<String> {
        Endpoint::new(
            "echo",
            |_| Some(RequestTemplate::new("/echo")),
            |_, body| {
                if body.starts_with('{') {
                    Ok(body.to_string())
                } else {
                    Err(ProviderError::parse("not json"))
                }
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_short_circuits() {
        let transport = ScriptedTransport::new();
        transport.ok("a.test", "{\"a\":1}");
        transport.ok("b.test", "{\"b\":1}");
        let registry = ProviderRegistry::new()
            .with(Capability::MarketData, provider("a", "a.test", 1))
            .with(Capability::MarketData, provider("b", "b.test", 2));
        let engine = engine(registry, &transport);

        let result = engine.execute(Capability::MarketData, &echo_endpoint()).await.unwrap();
        assert_eq!(result.provider, "a");
        assert_eq!(transport.call_count("b.test"), 0);
        assert_eq!(engine.health().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_http_and_parse_errors() {
        let transport = ScriptedTransport::new();
        transport.respond("a.test", 503, "unavailable");
        transport.ok("b.test", "<html>");
        transport.ok("c.test", "{}");
        let registry = ProviderRegistry::new()
            .with(Capability::News, provider("a", "a.test", 1))
            .with(Capability::News, provider("b", "b.test", 2))
            .with(Capability::News, provider("c", "c.test", 3));
        let engine = engine(registry, &transport);

        let result = engine.execute(Capability::News, &echo_endpoint()).await.unwrap();
        assert_eq!(result.provider, "c");

        let records = engine.health().records();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0].error.as_deref(),
            Some("HTTP status 503: unavailable")
        );
        assert_eq!(records[1].error.as_deref(), Some("Parse error: not json"));
        assert!(records[2].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_carries_last_error() {
        let transport = ScriptedTransport::new();
        transport.respond("a.test", 500, "boom");
        transport.fail("b.test", ProviderError::network("connection reset"));
        let registry = ProviderRegistry::new()
            .with(Capability::Sentiment, provider("a", "a.test", 1))
            .with(Capability::Sentiment, provider("b", "b.test", 2));
        let engine = engine(registry, &transport);

        let err = engine.execute(Capability::Sentiment, &echo_endpoint()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::AllProvidersExhausted {
                capability: Capability::Sentiment,
                attempted: 2,
                last_error: Some(ProviderError::network("connection reset")),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_providers_is_exhausted_without_attempts() {
        let transport = ScriptedTransport::new();
        let engine = engine(ProviderRegistry::new(), &transport);

        let err = engine.execute(Capability::Blockchain, &echo_endpoint()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::AllProvidersExhausted {
                capability: Capability::Blockchain,
                attempted: 0,
                last_error: None,
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_provider_skipped_not_counted() {
        let transport = ScriptedTransport::new();
        transport.ok("b.test", "{}");
        let registry = ProviderRegistry::new()
            .with(Capability::News, provider("a", "a.test", 1))
            .with(Capability::News, provider("b", "b.test", 2));
        let engine = engine(registry, &transport);

        let only_b = Endpoint::new(
            "only-b",
            |p: &ProviderConfig| (p.name == "b").then(|| RequestTemplate::new("/x")),
            |_, body| Ok(body.to_string()),
        );
        let result = engine.execute(Capability::News, &only_b).await.unwrap();
        assert_eq!(result.provider, "b");
        assert_eq!(engine.health().len(), 1);
        assert_eq!(transport.call_count("a.test"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_fallback() {
        let transport = ScriptedTransport::new();
        transport.hang("slow.test");
        transport.ok("fast.test", "{}");
        let registry = ProviderRegistry::new()
            .with(Capability::MarketData, provider("slow", "slow.test", 1))
            .with(Capability::MarketData, provider("fast", "fast.test", 2));
        let engine = engine(registry, &transport);

        let started = Instant::now();
        let result = engine.execute(Capability::MarketData, &echo_endpoint()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.provider, "fast");
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_millis(10_500));

        let records = engine.health().records();
        assert_eq!(records[0].error.as_deref(), Some("Timed out after 10000ms"));
        assert_eq!(records[0].duration_ms, 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_is_failed_attempt() {
        let transport = ScriptedTransport::new();
        transport.ok("a.test", "{\"a\":1}");
        transport.ok("b.test", "{\"b\":1}");
        let registry = ProviderRegistry::new()
            .with(
                Capability::MarketData,
                provider("a", "a.test", 1).with_rate_limit(RateLimit::per_minute(1)),
            )
            .with(Capability::MarketData, provider("b", "b.test", 2));
        let engine = engine(registry, &transport);

        let first = engine.execute(Capability::MarketData, &echo_endpoint()).await.unwrap();
        assert_eq!(first.provider, "a");

        let second = engine.execute(Capability::MarketData, &echo_endpoint()).await.unwrap();
        assert_eq!(second.provider, "b");
        assert_eq!(transport.call_count("a.test"), 1);

        let records = engine.health().records();
        assert!(records[1]
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Rate limited")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shapes_tried_in_order() {
        let transport = ScriptedTransport::new();
        transport.respond("/rich", 404, "gone");
        transport.ok("/plain", "{}");
        let registry =
            ProviderRegistry::new().with(Capability::MarketData, provider("a", "a.test", 1));
        let engine = engine(registry, &transport);

        let shapes = vec![
            Endpoint::new(
                "rich",
                |_| Some(RequestTemplate::new("/rich")),
                |_, _| Ok("rich"),
            ),
            Endpoint::new(
                "plain",
                |_| Some(RequestTemplate::new("/plain")),
                |_, _| Ok("plain"),
            ),
        ];
        let result = engine.execute_shapes(Capability::MarketData, &shapes).await.unwrap();
        assert_eq!(result.value, "plain");
        assert_eq!(engine.health().len(), 2);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
