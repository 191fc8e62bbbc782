//! HTTP transport seam
//!
//! The fallback engine only ever talks to an [`HttpTransport`]. Production
//! code uses [`ReqwestTransport`]; tests plug in [`ScriptedTransport`] to
//! replay canned responses without touching the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tracing::debug;

use cryptodash_core::ProviderError;

use crate::request::ProviderRequest;

/// Raw response handed back to the engine before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests on behalf of the engine
///
/// Implementations report transport-level failures as
/// [`ProviderError::Network`]; non-2xx statuses are returned as responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &ProviderRequest) -> Result<HttpResponse, ProviderError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ProviderError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent("CryptoDash/1.0")
            .build()
            .map_err(|e| ProviderError::network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &ProviderRequest) -> Result<HttpResponse, ProviderError> {
        debug!("[Transport] GET {}", request.redacted_url());

        let mut builder = self.http.get(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::network(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(e.without_url().to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(ProviderError),
}

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    delay: Option<Duration>,
    reply: Reply,
}

/// In-memory transport replaying canned responses
///
/// A request is answered by the most recently added route whose pattern
/// occurs in the request URL (query string included). Unmatched requests
/// fail with a network error. Every request URL is logged for assertions.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: &str, delay: Option<Duration>, reply: Reply) -> &Self {
        self.routes.lock().push(Route {
            pattern: pattern.to_string(),
            delay,
            reply,
        });
        self
    }

    /// Answer with `status` and `body`
    pub fn respond(&self, pattern: &str, status: u16, body: impl Into<String>) -> &Self {
        self.push(
            pattern,
            None,
            Reply::Respond(HttpResponse {
                status,
                body: body.into(),
            }),
        )
    }

    /// Answer 200 with `body`
    pub fn ok(&self, pattern: &str, body: impl Into<String>) -> &Self {
        self.respond(pattern, 200, body)
    }

    /// Answer 200 with `body` after `delay`
    pub fn ok_after(&self, pattern: &str, delay: Duration, body: impl Into<String>) -> &Self {
        self.push(pattern, Some(delay), Reply::Respond(HttpResponse::ok(body)))
    }

    /// Fail at the transport level
    pub fn fail(&self, pattern: &str, error: ProviderError) -> &Self {
        self.push(pattern, None, Reply::Fail(error))
    }

    /// Never answer; the caller's timeout decides
    pub fn hang(&self, pattern: &str) -> &Self {
        self.push(
            pattern,
            Some(Duration::from_secs(24 * 60 * 60)),
            Reply::Fail(ProviderError::network("hung request released")),
        )
    }

    /// All request URLs seen so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of requests whose URL contains `pattern`
    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &ProviderRequest) -> Result<HttpResponse, ProviderError> {
        let url = request.url.to_string();
        self.calls.lock().push(url.clone());

        let route = self
            .routes
            .lock()
            .iter()
            .rev()
            .find(|route| url.contains(&route.pattern))
            .cloned();

        let Some(route) = route else {
            return Err(ProviderError::network(format!("no scripted route for {}", url)));
        };

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        match route.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
        }
    }
}
