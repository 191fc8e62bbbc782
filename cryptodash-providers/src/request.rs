//! Provider-agnostic request templates
//!
//! A [`RequestTemplate`] describes one endpoint call relative to a provider's
//! base URL. Resolving it against a [`ProviderConfig`] applies the provider's
//! credential convention and yields a concrete [`ProviderRequest`].

use url::Url;

use cryptodash_core::{ProviderAuth, ProviderConfig, ProviderError};

/// Path, query and extra headers for one endpoint call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTemplate {
    /// Path appended to the provider base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestTemplate {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn query_opt(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Resolve against a provider: join URL, apply credentials
    pub fn resolve(&self, provider: &ProviderConfig) -> Result<ProviderRequest, ProviderError> {
        let joined = format!(
            "{}/{}",
            provider.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ProviderError::invalid_request(format!("bad url '{}': {}", joined, e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        let mut headers: Vec<(String, String)> = vec![(
            "accept".to_string(),
            "application/json".to_string(),
        )];
        headers.extend(
            self.headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone())),
        );

        match &provider.auth {
            ProviderAuth::None => {}
            ProviderAuth::HeaderKey { header, key } => {
                headers.push((header.to_ascii_lowercase(), key.clone()));
            }
            ProviderAuth::QueryParamKey { param, key } => {
                url.query_pairs_mut().append_pair(param, key);
            }
            ProviderAuth::BearerToken(token) => {
                headers.push(("authorization".to_string(), format!("Bearer {}", token)));
            }
        }

        // Url leaves a dangling `?` when no pairs were appended
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(ProviderRequest {
            provider: provider.name.clone(),
            url,
            headers,
        })
    }
}

/// Concrete request ready for a transport
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub provider: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl ProviderRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// URL with query values that may carry credentials masked, for logging
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let lower = k.to_lowercase();
                if lower.contains("key") || lower.contains("token") {
                    (k.into_owned(), "[REDACTED]".to_string())
                } else {
                    (k.into_owned(), v.into_owned())
                }
            })
            .collect();
        if pairs.is_empty() {
            return url.to_string();
        }
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

impl std::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("provider", &self.provider)
            .field("url", &self.redacted_url())
            .field("headers", &self.headers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptodash_core::ProviderId;

    fn provider(auth: ProviderAuth) -> ProviderConfig {
        ProviderConfig::new(ProviderId::CoinGecko, "https://api.example.test/v3/", 1).with_auth(auth)
    }

    #[test]
    fn test_resolve_joins_base_path() {
        let req = RequestTemplate::new("/simple/price")
            .query("ids", "bitcoin,ethereum")
            .resolve(&provider(ProviderAuth::None))
            .unwrap();

        assert_eq!(
            req.url.as_str(),
            "https://api.example.test/v3/simple/price?ids=bitcoin%2Cethereum"
        );
        assert_eq!(req.header("Accept"), Some("application/json"));
    }

    #[test]
    fn test_header_key_auth() {
        let req = RequestTemplate::new("/ping")
            .resolve(&provider(ProviderAuth::header("X-CG-Demo-API-Key", "k1")))
            .unwrap();
        assert_eq!(req.header("x-cg-demo-api-key"), Some("k1"));
        assert_eq!(req.url.query(), None);
    }

    #[test]
    fn test_query_param_auth() {
        let req = RequestTemplate::new("/v1/transactions")
            .query("min_value", 500000)
            .resolve(&provider(ProviderAuth::query_param("api_key", "secret")))
            .unwrap();
        assert_eq!(req.url.query(), Some("min_value=500000&api_key=secret"));
        assert!(req.redacted_url().contains("api_key=%5BREDACTED%5D"));
        assert!(!format!("{:?}", req).contains("secret"));
    }

    #[test]
    fn test_bearer_auth() {
        let req = RequestTemplate::new("/v2/assets")
            .resolve(&provider(ProviderAuth::bearer("tok")))
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn test_bad_base_url_is_invalid_request() {
        let broken = ProviderConfig::new(ProviderId::CoinGecko, "not a url", 1);
        let err = RequestTemplate::new("/x").resolve(&broken).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
