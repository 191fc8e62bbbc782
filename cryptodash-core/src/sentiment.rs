//! Sentiment data structures
//!
//! Every score here is on a 0-100 scale where 50 is neutral.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Midpoint used whenever a sentiment input is unavailable
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Banded classification of a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Extreme Fear")]
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    #[serde(rename = "Extreme Greed")]
    ExtremeGreed,
}

impl SentimentLabel {
    /// Classify a score: <25, <45, <=55, <=75, above
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            SentimentLabel::ExtremeFear
        } else if score < 45.0 {
            SentimentLabel::Fear
        } else if score <= 55.0 {
            SentimentLabel::Neutral
        } else if score <= 75.0 {
            SentimentLabel::Greed
        } else {
            SentimentLabel::ExtremeGreed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::ExtremeFear => "Extreme Fear",
            SentimentLabel::Fear => "Fear",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Greed => "Greed",
            SentimentLabel::ExtremeGreed => "Extreme Greed",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market-wide fear & greed reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedIndex {
    pub value: u8,
    /// Provider's own label, e.g. "Extreme Fear"
    pub classification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FearGreedIndex {
    /// `{value: 50, classification: "Neutral"}`
    pub fn neutral() -> Self {
        Self {
            value: 50,
            classification: SentimentLabel::Neutral.to_string(),
            timestamp: None,
        }
    }
}

impl Default for FearGreedIndex {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Composite sentiment for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentData {
    pub symbol: String,
    /// Weighted composite of the three inputs
    pub value: f64,
    pub classification: SentimentLabel,
    pub fear_greed: f64,
    /// Community upvote percentage
    pub community: f64,
    /// Normalized social follower score
    pub social: f64,
    /// Providers that contributed a live input
    pub sources: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl SentimentData {
    /// All inputs at the neutral midpoint
    pub fn neutral(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            value: NEUTRAL_SCORE,
            classification: SentimentLabel::Neutral,
            fear_greed: NEUTRAL_SCORE,
            community: NEUTRAL_SCORE,
            social: NEUTRAL_SCORE,
            sources: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// True when no input came from a live source
    pub fn is_neutral_default(&self) -> bool {
        self.sources.is_empty()
    }
}
