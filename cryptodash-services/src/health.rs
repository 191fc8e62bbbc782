//! Provider health tracking
//!
//! Every provider attempt the engine makes is appended to a bounded ring
//! buffer. Summaries are derived on demand from whatever is still in the
//! window. Health is advisory; the engine never consults it.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use cryptodash_core::Capability;

pub const DEFAULT_HEALTH_CAPACITY: usize = 200;

/// Outcome of a single provider attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub capability: Capability,
    pub provider: String,
    pub success: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn success(capability: Capability, provider: &str, duration_ms: u64) -> Self {
        Self {
            capability,
            provider: provider.to_string(),
            success: true,
            duration_ms,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failure(
        capability: Capability,
        provider: &str,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            provider: provider.to_string(),
            success: false,
            duration_ms,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// What a summary is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthScope<'a> {
    Capability(Capability),
    Provider(&'a str),
}

impl HealthScope<'_> {
    fn matches(&self, record: &AttemptRecord) -> bool {
        match self {
            HealthScope::Capability(c) => record.capability == *c,
            HealthScope::Provider(p) => record.provider == *p,
        }
    }
}

/// Aggregated view over the records in a scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total_requests: usize,
    /// 0.0 - 1.0; 0.0 when there are no records
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthSummary {
    fn from_records<'a>(records: impl Iterator<Item = &'a AttemptRecord>) -> Self {
        let mut total = 0usize;
        let mut successes = 0usize;
        let mut duration_sum = 0u64;
        let mut last_error = None;

        for record in records {
            total += 1;
            duration_sum += record.duration_ms;
            if record.success {
                successes += 1;
            } else if record.error.is_some() {
                last_error = record.error.clone();
            }
        }

        if total == 0 {
            return Self {
                total_requests: 0,
                success_rate: 0.0,
                avg_duration_ms: 0.0,
                last_error: None,
            };
        }

        Self {
            total_requests: total,
            success_rate: successes as f64 / total as f64,
            avg_duration_ms: duration_sum as f64 / total as f64,
            last_error,
        }
    }
}

/// Bounded rolling log of attempts
#[derive(Debug)]
pub struct HealthTracker {
    capacity: usize,
    records: Mutex<VecDeque<AttemptRecord>>,
}

impl HealthTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append, evicting the oldest record when full
    pub fn record(&self, record: AttemptRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn summary(&self, scope: HealthScope<'_>) -> HealthSummary {
        let records = self.records.lock();
        HealthSummary::from_records(records.iter().filter(|r| scope.matches(r)))
    }

    /// Rolling success rate of `provider`, `None` without data
    pub fn success_rate(&self, provider: &str) -> Option<f64> {
        let summary = self.summary(HealthScope::Provider(provider));
        (summary.total_requests > 0).then_some(summary.success_rate)
    }

    /// True with no data yet, otherwise whether the success rate meets `min_success_rate`
    pub fn is_healthy(&self, provider: &str, min_success_rate: f64) -> bool {
        self.success_rate(provider)
            .map_or(true, |rate| rate >= min_success_rate)
    }

    /// Share of successful attempts for `capability` in the window
    pub fn uptime(&self, capability: Capability) -> Option<f64> {
        let summary = self.summary(HealthScope::Capability(capability));
        (summary.total_requests > 0).then_some(summary.success_rate)
    }

    /// Summary for every provider seen in the window, by name
    pub fn provider_summaries(&self) -> BTreeMap<String, HealthSummary> {
        let records = self.records.lock();
        let mut names: Vec<&str> = records.iter().map(|r| r.provider.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                let summary = HealthSummary::from_records(
                    records.iter().filter(|r| r.provider == name),
                );
                (name.to_string(), summary)
            })
            .collect()
    }

    /// Summary for every capability seen in the window
    pub fn capability_summaries(&self) -> BTreeMap<Capability, HealthSummary> {
        let records = self.records.lock();
        Capability::ALL
            .into_iter()
            .filter(|c| records.iter().any(|r| r.capability == *c))
            .map(|c| {
                let summary =
                    HealthSummary::from_records(records.iter().filter(|r| r.capability == c));
                (c, summary)
            })
            .collect()
    }

    /// Copy of the window, oldest first
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let tracker = HealthTracker::new(3);
        for i in 0..5 {
            tracker.record(AttemptRecord::success(Capability::News, &format!("p{}", i), 10));
        }

        let providers: Vec<String> = tracker.records().into_iter().map(|r| r.provider).collect();
        assert_eq!(providers, vec!["p2", "p3", "p4"]);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_summary_by_provider_and_capability() {
        let tracker = HealthTracker::default();
        tracker.record(AttemptRecord::failure(Capability::MarketData, "a", 100, "timeout"));
        tracker.record(AttemptRecord::success(Capability::MarketData, "b", 50));
        tracker.record(AttemptRecord::success(Capability::News, "a", 30));

        let a = tracker.summary(HealthScope::Provider("a"));
        assert_eq!(a.total_requests, 2);
        assert_eq!(a.success_rate, 0.5);
        assert_eq!(a.avg_duration_ms, 65.0);
        assert_eq!(a.last_error.as_deref(), Some("timeout"));

        let market = tracker.summary(HealthScope::Capability(Capability::MarketData));
        assert_eq!(market.total_requests, 2);
        assert_eq!(tracker.uptime(Capability::News), Some(1.0));
        assert_eq!(tracker.uptime(Capability::Sentiment), None);
    }

    #[test]
    fn test_is_healthy_optimistic_without_data() {
        let tracker = HealthTracker::default();
        assert!(tracker.is_healthy("never-called", 0.9));

        tracker.record(AttemptRecord::failure(Capability::News, "flaky", 10, "503"));
        tracker.record(AttemptRecord::success(Capability::News, "flaky", 10));
        assert!(tracker.is_healthy("flaky", 0.5));
        assert!(!tracker.is_healthy("flaky", 0.75));
    }

    #[test]
    fn test_empty_summary() {
        let summary = HealthTracker::default().summary(HealthScope::Provider("x"));
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.last_error.is_none());
    }

    #[test]
    fn test_grouped_summaries() {
        let tracker = HealthTracker::default();
        tracker.record(AttemptRecord::success(Capability::Sentiment, "alternative.me", 10));
        tracker.record(AttemptRecord::failure(Capability::News, "newsapi", 10, "401"));

        let providers = tracker.provider_summaries();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers["newsapi"].success_rate, 0.0);

        let capabilities = tracker.capability_summaries();
        assert_eq!(
            capabilities.keys().copied().collect::<Vec<_>>(),
            vec![Capability::News, Capability::Sentiment]
        );
    }
}
