//! NewsAPI adapter (`/everything`)
//!
//! Requires an API key; without a credential no request is built.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use cryptodash_core::{NewsArticle, ProviderConfig, ProviderError};

use crate::convert::{from_body, parse_timestamp};
use crate::request::RequestTemplate;

const DEFAULT_QUERY: &str = "cryptocurrency OR bitcoin OR ethereum";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    source: ArticleSource,
    title: Option<String>,
    description: Option<String>,
    url: String,
    url_to_image: Option<String>,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// Search parameters for `/everything`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsQuery {
    pub q: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
}

pub fn everything_request(provider: &ProviderConfig, query: &NewsQuery) -> Option<RequestTemplate> {
    if !provider.auth.has_credential() {
        return None;
    }
    let q = query
        .q
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .unwrap_or(DEFAULT_QUERY);

    Some(
        RequestTemplate::new("/everything")
            .query("q", q)
            .query("language", "en")
            .query("sortBy", "publishedAt")
            .query("pageSize", query.limit.clamp(1, MAX_PAGE_SIZE))
            .query_opt("from", query.from.map(|d| d.to_rfc3339()))
            .query_opt("to", query.to.map(|d| d.to_rfc3339())),
    )
}

pub fn parse_everything(body: &str, provider: &str) -> Result<Vec<NewsArticle>, ProviderError> {
    let response: Response = from_body(body, "newsapi everything")?;
    if response.status != "ok" {
        return Err(ProviderError::parse(format!(
            "newsapi error: {}",
            response.message.unwrap_or(response.status)
        )));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.title.filter(|t| t != "[Removed]")?;
            let published_at = parse_timestamp(&article.published_at)?;
            Some(NewsArticle {
                id: article.url.clone(),
                title,
                description: article.description.unwrap_or_default(),
                url: article.url,
                source: article.source.name.unwrap_or_else(|| "NewsAPI".to_string()),
                published_at,
                image_url: article.url_to_image,
                currencies: Vec::new(),
                provider: provider.to_string(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptodash_core::{ProviderAuth, ProviderId};

    fn keyed() -> ProviderConfig {
        ProviderConfig::new(ProviderId::NewsApi, "https://newsapi.test/v2", 3)
            .with_auth(ProviderAuth::header("X-Api-Key", "k"))
    }

    #[test]
    fn test_request_requires_key() {
        let anonymous = ProviderConfig::new(ProviderId::NewsApi, "https://newsapi.test/v2", 3);
        assert!(everything_request(&anonymous, &NewsQuery::default()).is_none());
    }

    #[test]
    fn test_request_with_window() {
        let from = parse_timestamp("2024-03-01T00:00:00Z").unwrap();
        let query = NewsQuery {
            q: Some("solana".to_string()),
            from: Some(from),
            to: None,
            limit: 500,
        };
        let template = everything_request(&keyed(), &query).unwrap();
        assert!(template.query.contains(&("q".into(), "solana".into())));
        assert!(template.query.contains(&("pageSize".into(), "100".into())));
        assert!(template
            .query
            .contains(&("from".into(), "2024-03-01T00:00:00+00:00".into())));
        assert!(!template.query.iter().any(|(k, _)| k == "to"));
    }

    #[test]
    fn test_parse_everything() {
        let body = r#"{"status":"ok","totalResults":2,"articles":[
            {"source":{"id":null,"name":"Reuters"},"author":"x","title":"Bitcoin ETF flows",
             "description":"Inflows rise","url":"https://reuters.test/a","urlToImage":null,
             "publishedAt":"2024-03-01T09:00:00Z","content":"..."},
            {"source":{"id":null,"name":null},"title":"[Removed]","url":"https://removed.com",
             "publishedAt":"2024-03-01T08:00:00Z"}
        ]}"#;
        let articles = parse_everything(body, "newsapi").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "Reuters");
        assert_eq!(articles[0].id, "https://reuters.test/a");
    }

    #[test]
    fn test_error_status_is_parse_error() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
        let err = parse_everything(body, "newsapi").unwrap_err();
        assert_eq!(
            err,
            ProviderError::parse("newsapi error: Your API key is invalid.")
        );
    }
}
