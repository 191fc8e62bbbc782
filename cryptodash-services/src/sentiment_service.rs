//! Sentiment service
//!
//! The composite score blends three 0-100 inputs:
//!
//! | input        | weight | source                                   |
//! |--------------|--------|------------------------------------------|
//! | fear / greed | 0.4    | Alternative.me index                     |
//! | community    | 0.3    | CoinGecko up-vote percentage             |
//! | social       | 0.3    | CoinGecko followers, log-scaled          |
//!
//! Any input whose source is unavailable counts as the neutral 50.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use cryptodash_core::{
    Capability, FearGreedIndex, FetchError, FetchResult, ProviderId, SentimentData,
    SentimentLabel, NEUTRAL_SCORE,
};
use cryptodash_providers::{alternative_me, coingecko, AssetInfo, CommunityStats, SymbolMap};

use crate::cache::ResponseCache;
use crate::config::CacheTtls;
use crate::engine::{unsupported, Endpoint, FallbackEngine, Sourced};

pub const FEAR_GREED_WEIGHT: f64 = 0.4;
pub const COMMUNITY_WEIGHT: f64 = 0.3;
pub const SOCIAL_WEIGHT: f64 = 0.3;

/// Follower count that maps to a social score of 100
const SOCIAL_SATURATION: f64 = 10_000_000.0;

pub struct SentimentService {
    engine: Arc<FallbackEngine>,
    cache: Arc<ResponseCache>,
    symbols: Arc<SymbolMap>,
    ttls: CacheTtls,
}

impl SentimentService {
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

    /// Market-wide Fear & Greed index, neutral when unavailable
    #[instrument(skip(self))]
    pub async fn get_fear_greed(&self) -> FearGreedIndex {
        self.try_fear_greed().await.unwrap_or_else(|e| {
            warn!("[SentimentService] Fear & Greed unavailable: {}", e);
            FearGreedIndex::neutral()
        })
    }

    pub async fn try_fear_greed(&self) -> FetchResult<FearGreedIndex> {
        Ok(self.fear_greed_sourced().await?.value)
    }

    /// Community stats for `symbol`
    pub async fn try_community(&self, symbol: &str) -> FetchResult<CommunityStats> {
        Ok(self.community_sourced(symbol).await?.value)
    }

    /// Composite score for `symbol`, neutral when no input is available
    #[instrument(skip(self))]
    pub async fn get_sentiment(&self, symbol: &str) -> SentimentData {
        self.try_sentiment(symbol).await.unwrap_or_else(|e| {
            warn!("[SentimentService] Neutral sentiment for {}: {}", symbol, e);
            SentimentData::neutral(symbol.trim().to_uppercase())
        })
    }

    /// Fails only when both upstream inputs fail
    pub async fn try_sentiment(&self, symbol: &str) -> FetchResult<SentimentData> {
        if symbol.trim().is_empty() {
            return Err(FetchError::invalid_query("empty symbol"));
        }
        let symbol = symbol.trim().to_uppercase();

        let (fear_greed, community) =
            tokio::join!(self.fear_greed_sourced(), self.community_sourced(&symbol));

        match (fear_greed, community) {
            (Err(e), Err(_)) => Err(e),
            (fear_greed, community) => Ok(composite(symbol, fear_greed.ok(), community.ok())),
        }
    }

    async fn fear_greed_sourced(&self) -> FetchResult<Sourced<FearGreedIndex>> {
        self.cache
            .get_or_fetch("sentiment:fng", self.ttls.sentiment, || async {
                self.engine
                    .execute(Capability::Sentiment, &fear_greed_endpoint())
                    .await
            })
            .await
    }

    async fn community_sourced(&self, symbol: &str) -> FetchResult<Sourced<CommunityStats>> {
        let asset = self.symbols.resolve(symbol);
        let key = format!("sentiment:community:{}", asset.symbol);
        self.cache
            .get_or_fetch(&key, self.ttls.sentiment, || async {
                let endpoint = community_endpoint(asset.clone());
                self.engine.execute(Capability::Sentiment, &endpoint).await
            })
            .await
    }
}

impl std::fmt::Debug for SentimentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentService")
            .field("ttls", &self.ttls)
            .finish()
    }
}

/// `ln(1 + followers)` scaled so [`SOCIAL_SATURATION`] followers is 100
pub fn social_score(followers: u64) -> f64 {
    let score = (1.0 + followers as f64).ln() / (1.0 + SOCIAL_SATURATION).ln() * 100.0;
    score.clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn composite(
    symbol: String,
    fear_greed: Option<Sourced<FearGreedIndex>>,
    community: Option<Sourced<CommunityStats>>,
) -> SentimentData {
    let mut sources = Vec::new();

    let fear_greed_score = match fear_greed {
        Some(sourced) => {
            sources.push(sourced.provider);
            f64::from(sourced.value.value)
        }
        None => NEUTRAL_SCORE,
    };

    let (community_score, social) = match community {
        Some(sourced) => {
            let stats = sourced.value;
            if stats.up_votes_percentage.is_some() || stats.followers.is_some() {
                sources.push(sourced.provider);
            }
            (
                stats
                    .up_votes_percentage
                    .map(|p| p.clamp(0.0, 100.0))
                    .unwrap_or(NEUTRAL_SCORE),
                stats.followers.map(social_score).unwrap_or(NEUTRAL_SCORE),
            )
        }
        None => (NEUTRAL_SCORE, NEUTRAL_SCORE),
    };

    let value = round2(
        FEAR_GREED_WEIGHT * fear_greed_score
            + COMMUNITY_WEIGHT * community_score
            + SOCIAL_WEIGHT * social,
    );
    debug!(
        "[SentimentService] {} = {} (fg {}, community {:.1}, social {:.1})",
        symbol, value, fear_greed_score, community_score, social
    );

    SentimentData {
        symbol,
        value,
        classification: SentimentLabel::from_score(value),
        fear_greed: fear_greed_score,
        community: round2(community_score),
        social: round2(social),
        sources,
        updated_at: Utc::now(),
    }
}

fn fear_greed_endpoint() -> Endpoint<FearGreedIndex> {
    Endpoint::new(
        "fear-greed",
        |provider| match provider.id {
            ProviderId::AlternativeMe => Some(alternative_me::fng_request()),
            _ => None,
        },
        |provider, body| match provider.id {
            ProviderId::AlternativeMe => alternative_me::parse_fng(body),
            other => Err(unsupported(other, "the fear & greed index")),
        },
    )
}

fn community_endpoint(asset: AssetInfo) -> Endpoint<CommunityStats> {
    Endpoint::new(
        "community",
        move |provider| match provider.id {
            ProviderId::CoinGecko => Some(coingecko::community_request(&asset)),
            _ => None,
        },
        |provider, body| match provider.id {
            ProviderId::CoinGecko => coingecko::parse_community(body),
            other => Err(unsupported(other, "community data")),
        },
    )
}
