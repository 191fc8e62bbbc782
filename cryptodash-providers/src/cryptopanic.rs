//! CryptoPanic news adapter
//!
//! Requires an `auth_token`; without a credential no request is built.

use serde::Deserialize;

use cryptodash_core::{NewsArticle, ProviderConfig, ProviderError};

use crate::convert::{from_body, parse_timestamp};
use crate::request::RequestTemplate;

#[derive(Debug, Deserialize)]
struct Posts {
    results: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: u64,
    title: String,
    url: String,
    published_at: String,
    domain: Option<String>,
    source: Option<PostSource>,
    #[serde(default)]
    currencies: Vec<Currency>,
}

#[derive(Debug, Deserialize)]
struct PostSource {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Currency {
    code: String,
}

pub fn posts_request(provider: &ProviderConfig, currency: Option<&str>) -> Option<RequestTemplate> {
    if !provider.auth.has_credential() {
        return None;
    }
    Some(
        RequestTemplate::new("/posts/")
            .query("public", "true")
            .query("kind", "news")
            .query_opt("currencies", currency.map(str::to_uppercase)),
    )
}

pub fn parse_posts(body: &str, provider: &str) -> Result<Vec<NewsArticle>, ProviderError> {
    let posts: Posts = from_body(body, "cryptopanic posts")?;

    Ok(posts
        .results
        .into_iter()
        .filter_map(|post| {
            let published_at = parse_timestamp(&post.published_at)?;
            let source = post
                .source
                .map(|s| s.title)
                .or(post.domain)
                .unwrap_or_else(|| "CryptoPanic".to_string());
            Some(NewsArticle {
                id: format!("cryptopanic-{}", post.id),
                title: post.title,
                description: String::new(),
                url: post.url,
                source,
                published_at,
                image_url: None,
                currencies: post.currencies.into_iter().map(|c| c.code).collect(),
                provider: provider.to_string(),
            })
        })
        .collect())
}
