//! News service
//!
//! Headlines from CryptoPanic, CryptoCompare and NewsAPI. Every result is
//! de-duplicated by URL and sorted newest first before it is cached.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use cryptodash_core::{
    Capability, FetchError, FetchResult, NewsArticle, ProviderError, ProviderId,
};
use cryptodash_providers::{cryptocompare, cryptopanic, newsapi, NewsQuery, SymbolMap};

use crate::cache::ResponseCache;
use crate::config::CacheTtls;
use crate::engine::{unsupported, Endpoint, FallbackEngine};

/// Articles requested per upstream call; callers slice from this
const FETCH_SIZE: usize = 50;

/// Search terms and optional publication window
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchFilter {
    terms: Vec<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl SearchFilter {
    fn new(query: &str, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            terms: query
                .split_whitespace()
                .map(str::to_lowercase)
                .filter(|t| t != "or" && t != "and")
                .collect(),
            from,
            to,
        }
    }

    /// Any term in title or description, inside the window
    fn matches(&self, article: &NewsArticle) -> bool {
        if self.from.is_some_and(|from| article.published_at < from)
            || self.to.is_some_and(|to| article.published_at > to)
        {
            return false;
        }
        let haystack = format!("{} {}", article.title, article.description).to_lowercase();
        self.terms.iter().any(|t| haystack.contains(t.as_str()))
    }
}

pub struct NewsService {
    engine: Arc<FallbackEngine>,
    cache: Arc<ResponseCache>,
    symbols: Arc<SymbolMap>,
    ttls: CacheTtls,
}

impl NewsService {
    pub fn new(
        engine: Arc<FallbackEngine>,
        cache: Arc<ResponseCache>,
        symbols: Arc<SymbolMap>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            engine,
            cache,
            symbols,
            ttls,
        }
    }

    /// Newest `limit` headlines, or an empty list
    #[instrument(skip(self))]
    pub async fn get_latest_news(&self, limit: usize) -> Vec<NewsArticle> {
        self.try_latest_news(limit).await.unwrap_or_else(|e| {
            warn!("[NewsService] No headlines: {}", e);
            Vec::new()
        })
    }

    pub async fn try_latest_news(&self, limit: usize) -> FetchResult<Vec<NewsArticle>> {
        let articles = self
            .cache
            .get_or_fetch("news:latest", self.ttls.news, || async {
                let sourced = self
                    .engine
                    .execute(Capability::News, &latest_endpoint())
                    .await?;
                debug!(
                    "[NewsService] {} headline(s) from {}",
                    sourced.value.len(),
                    sourced.provider
                );
                Ok::<_, FetchError>(normalize(sourced.value))
            })
            .await?;
        Ok(take(articles, limit))
    }

    /// Articles matching `query`, or an empty list when no provider answers
    #[instrument(skip(self))]
    pub async fn search_news(
        &self,
        query: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<NewsArticle> {
        self.try_search_news(query, from, to, limit)
            .await
            .unwrap_or_else(|e| {
                warn!("[NewsService] Search '{}' failed: {}", query, e);
                Vec::new()
            })
    }

    /// Full-text search through NewsAPI, then filtered headlines elsewhere
    ///
    /// `Ok(vec![])` means a provider answered with zero matches; `Err` means
    /// no provider could be queried.
    pub async fn try_search_news(
        &self,
        query: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> FetchResult<Vec<NewsArticle>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FetchError::invalid_query("empty search query"));
        }
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(FetchError::invalid_query(format!(
                    "search window starts after it ends ({} > {})",
                    from, to
                )));
            }
        }

        let key = format!(
            "news:search:{}:{}:{}",
            query.to_lowercase(),
            from.map(|d| d.timestamp()).unwrap_or_default(),
            to.map(|d| d.timestamp()).unwrap_or_default()
        );
        let search = NewsQuery {
            q: Some(query.to_string()),
            from,
            to,
            limit: FETCH_SIZE,
        };
        let filter = Arc::new(SearchFilter::new(query, from, to));

        let articles = self
            .cache
            .get_or_fetch(&key, self.ttls.news, || async {
                let shapes = [search_endpoint(search), filtered_latest_endpoint(filter)];
                let sourced = self
                    .engine
                    .execute_shapes(Capability::News, &shapes)
                    .await?;
                Ok::<_, FetchError>(normalize(sourced.value))
            })
            .await?;
        Ok(take(articles, limit))
    }

    /// Headlines mentioning `symbol`, or an empty list
    #[instrument(skip(self))]
    pub async fn get_news_for_symbol(&self, symbol: &str, limit: usize) -> Vec<NewsArticle> {
        self.try_news_for_symbol(symbol, limit)
            .await
            .unwrap_or_else(|e| {
                warn!("[NewsService] No news for {}: {}", symbol, e);
                Vec::new()
            })
    }

    pub async fn try_news_for_symbol(
        &self,
        symbol: &str,
        limit: usize,
    ) -> FetchResult<Vec<NewsArticle>> {
        if symbol.trim().is_empty() {
            return Err(FetchError::invalid_query("empty symbol"));
        }
        let asset = self.symbols.resolve(symbol);
        let key = format!("news:symbol:{}", asset.symbol);

        let articles = self
            .cache
            .get_or_fetch(&key, self.ttls.news, || async {
                let endpoint = symbol_endpoint(asset.symbol.clone(), asset.name.clone());
                let sourced = self.engine.execute(Capability::News, &endpoint).await?;
                Ok::<_, FetchError>(normalize(sourced.value))
            })
            .await?;
        Ok(take(articles, limit))
    }
}

impl std::fmt::Debug for NewsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsService")
            .field("ttls", &self.ttls)
            .finish()
    }
}

/// Drop repeated URLs, keep the newest first
fn normalize(mut articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let mut seen = HashSet::new();
    articles.retain(|a| seen.insert(a.url.clone()));
    articles
}

fn take(mut articles: Vec<NewsArticle>, limit: usize) -> Vec<NewsArticle> {
    articles.truncate(limit);
    articles
}

fn parse_any(
    provider_id: ProviderId,
    name: &str,
    body: &str,
) -> Result<Vec<NewsArticle>, ProviderError> {
    match provider_id {
        ProviderId::CryptoPanic => cryptopanic::parse_posts(body, name),
        ProviderId::CryptoCompare => cryptocompare::parse_news(body, name),
        ProviderId::NewsApi => newsapi::parse_everything(body, name),
        other => Err(unsupported(other, "news")),
    }
}

fn latest_endpoint() -> Endpoint<Vec<NewsArticle>> {
    Endpoint::new(
        "latest",
        |provider| match provider.id {
            ProviderId::CryptoPanic => cryptopanic::posts_request(provider, None),
            ProviderId::CryptoCompare => Some(cryptocompare::news_request()),
            ProviderId::NewsApi => newsapi::everything_request(
                provider,
                &NewsQuery {
                    limit: FETCH_SIZE,
                    ..NewsQuery::default()
                },
            ),
            _ => None,
        },
        |provider, body| parse_any(provider.id, &provider.name, body),
    )
}

fn search_endpoint(query: NewsQuery) -> Endpoint<Vec<NewsArticle>> {
    Endpoint::new(
        "search",
        move |provider| match provider.id {
            ProviderId::NewsApi => newsapi::everything_request(provider, &query),
            _ => None,
        },
        |provider, body| parse_any(provider.id, &provider.name, body),
    )
}

/// Latest headlines narrowed down locally for providers without search
fn filtered_latest_endpoint(filter: Arc<SearchFilter>) -> Endpoint<Vec<NewsArticle>> {
    Endpoint::new(
        "filtered-latest",
        |provider| match provider.id {
            ProviderId::CryptoPanic => cryptopanic::posts_request(provider, None),
            ProviderId::CryptoCompare => Some(cryptocompare::news_request()),
            _ => None,
        },
        move |provider, body| {
            let articles = parse_any(provider.id, &provider.name, body)?;
            Ok(articles.into_iter().filter(|a| filter.matches(a)).collect())
        },
    )
}

fn symbol_endpoint(symbol: String, name: String) -> Endpoint<Vec<NewsArticle>> {
    let request_symbol = symbol.clone();
    let request_name = name.clone();
    Endpoint::new(
        "symbol",
        move |provider| match provider.id {
            ProviderId::CryptoPanic => cryptopanic::posts_request(provider, Some(&request_symbol)),
            ProviderId::CryptoCompare => Some(cryptocompare::news_for_request(&request_symbol)),
            ProviderId::NewsApi => newsapi::everything_request(
                provider,
                &NewsQuery {
                    q: Some(format!("\"{}\" OR {}", request_name, request_symbol)),
                    limit: FETCH_SIZE,
                    ..NewsQuery::default()
                },
            ),
            _ => None,
        },
        move |provider, body| {
            let articles = parse_any(provider.id, &provider.name, body)?;
            Ok(articles
                .into_iter()
                .filter(|a| a.mentions(&symbol, Some(&name)))
                .collect())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, provider};
    use cryptodash_core::ProviderAuth;
    use cryptodash_providers::{ProviderRegistry, ScriptedTransport};

    const CRYPTOCOMPARE_NEWS: &str = r#"{"Type":100,"Message":"News list successfully returned","Data":[
        {"id":"1","published_on":1709337600,"title":"Bitcoin tops $60k","url":"https://news.test/btc","body":"BTC rallies","source":"coindesk","categories":"BTC|Market"},
        {"id":"2","published_on":1709341200,"title":"Solana outage","url":"https://news.test/sol","body":"Validators restart","source":"theblock","categories":"SOL"},
        {"id":"3","published_on":1709330400,"title":"Bitcoin tops $60k (repost)","url":"https://news.test/btc","body":"","source":"coindesk","categories":"BTC"}
    ]}"#;

    fn service(registry: ProviderRegistry, transport: &ScriptedTransport) -> NewsService {
        NewsService::new(
            engine(registry, transport),
            Arc::new(ResponseCache::new()),
            Arc::new(SymbolMap::default()),
            CacheTtls::default(),
        )
    }

    fn news_registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with(Capability::News, provider(ProviderId::CryptoPanic, "cp.test", 1))
            .with(Capability::News, provider(ProviderId::CryptoCompare, "ccmp.test", 2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_skips_keyless_provider_and_normalizes() {
        let transport = ScriptedTransport::new();
        transport.ok("ccmp.test/data/v2/news", CRYPTOCOMPARE_NEWS);
        let svc = service(news_registry(), &transport);

        let articles = svc.get_latest_news(10).await;
        let urls: Vec<&str> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://news.test/sol", "https://news.test/btc"]);
        assert_eq!(articles[1].title, "Bitcoin tops $60k");
        assert_eq!(transport.call_count("cp.test"), 0);

        assert_eq!(svc.get_latest_news(1).await.len(), 1);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_zero_results_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.ok("ccmp.test/data/v2/news", CRYPTOCOMPARE_NEWS);
        let svc = service(news_registry(), &transport);

        let hits = svc.try_search_news("dogecoin", None, None, 10).await.unwrap();
        assert!(hits.is_empty());

        let hits = svc.try_search_news("solana", None, None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_without_providers_is_an_error() {
        let transport = ScriptedTransport::new();
        let svc = service(ProviderRegistry::new(), &transport);

        let err = svc.try_search_news("bitcoin", None, None, 10).await.unwrap_err();
        assert!(matches!(err, FetchError::AllProvidersExhausted { .. }));
        assert!(svc.search_news("bitcoin", None, None, 10).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_prefers_newsapi_when_keyed() {
        let transport = ScriptedTransport::new();
        transport.ok(
            "newsapi.test/everything",
            r#"{"status":"ok","totalResults":1,"articles":[
                {"source":{"name":"Reuters"},"title":"ETF flows","description":null,
                 "url":"https://reuters.test/etf","urlToImage":null,"publishedAt":"2024-03-01T12:00:00Z"}
            ]}"#,
        );
        let registry = news_registry().with(
            Capability::News,
            provider(ProviderId::NewsApi, "newsapi.test", 3)
                .with_auth(ProviderAuth::header("X-Api-Key", "k")),
        );
        let svc = service(registry, &transport);

        let hits = svc.try_search_news("etf", None, None, 5).await.unwrap();
        assert_eq!(hits[0].source, "Reuters");
        assert!(transport.calls()[0].contains("q=etf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inverted_window_rejected() {
        let transport = ScriptedTransport::new();
        let svc = service(news_registry(), &transport);
        let now = Utc::now();

        let err = svc
            .try_search_news("btc", Some(now), Some(now - chrono::Duration::days(1)), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidQuery(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_news_filters_mentions() {
        let transport = ScriptedTransport::new();
        transport.ok("ccmp.test/data/v2/news", CRYPTOCOMPARE_NEWS);
        let svc = service(news_registry(), &transport);

        let articles = svc.get_news_for_symbol("sol", 10).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Solana outage");
        assert!(transport.calls()[0].contains("categories=SOL"));
    }

    #[test]
    fn test_filter_drops_boolean_operators() {
        let filter = SearchFilter::new("bitcoin OR etf", None, None);
        assert_eq!(filter.terms, vec!["bitcoin", "etf"]);
    }
}
