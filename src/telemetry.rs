//! Test outcome metrics.
//!
//! Counters and duration histograms are namespaced (`rulekit.` by default)
//! and can be snapshotted into a serializable form for suite reports.

use crate::failure::OutcomeStatus;
use crate::timeouts::saturating_millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "rulekit";
pub const TESTS_PASSED: &str = "tests.passed";
pub const TESTS_FAILED: &str = "tests.failed";
pub const TESTS_SKIPPED: &str = "tests.skipped";
pub const TESTS_TIMED_OUT: &str = "tests.timed_out";
pub const TEST_DURATION_MS: &str = "test.duration_ms";
/// Gauge holding the number of tests the last suite run registered.
pub const TESTS_REGISTERED: &str = "tests.registered";
/// Upper bucket of the duration histogram; slower tests land in it.
pub const DURATION_HISTOGRAM_MAX_MS: u64 = 60_000;

#[derive(Debug)]
pub struct MetricsRegistry {
    namespace: String,
    counters: BTreeMap<String, u64>,
    histograms: BTreeMap<String, Histogram>,
    gauges: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            counters: BTreeMap::new(),
            histograms: BTreeMap::new(),
            gauges: BTreeMap::new(),
        }
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, delta: u64) -> u64 {
        let key = self.qualify(name.into());
        let counter = self.counters.entry(key).or_insert(0);
        *counter = counter.saturating_add(delta);
        *counter
    }

    pub fn counter(&self, name: impl Into<String>) -> u64 {
        let key = self.qualify(name.into());
        self.counters.get(&key).copied().unwrap_or(0)
    }

    pub fn register_histogram(&mut self, name: impl Into<String>, max_value: u64) -> &mut Histogram {
        let key = self.qualify(name.into());
        self.histograms
            .entry(key)
            .or_insert_with(|| Histogram::canonical(max_value))
    }

    pub fn observe_histogram(
        &mut self,
        name: impl Into<String>,
        value: u64,
    ) -> Result<(), TelemetryError> {
        let key = self.qualify(name.into());
        let histogram = self
            .histograms
            .get_mut(&key)
            .ok_or_else(|| TelemetryError::UnknownHistogram(key.clone()))?;
        histogram.observe(value);
        Ok(())
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: u64) {
        let key = self.qualify(name.into());
        self.gauges.insert(key, value);
    }

    /// Bumps the counter matching `status` and records `elapsed` in the
    /// duration histogram.
    pub fn record_outcome(
        &mut self,
        status: OutcomeStatus,
        elapsed: Duration,
    ) -> Result<(), TelemetryError> {
        let counter = match status {
            OutcomeStatus::Passed => TESTS_PASSED,
            OutcomeStatus::Failed => TESTS_FAILED,
            OutcomeStatus::Skipped => TESTS_SKIPPED,
            OutcomeStatus::TimedOut => TESTS_TIMED_OUT,
        };
        self.inc_counter(counter, 1);
        self.register_histogram(TEST_DURATION_MS, DURATION_HISTOGRAM_MAX_MS);
        let millis = saturating_millis(elapsed);
        self.observe_histogram(TEST_DURATION_MS, millis)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            histograms: self
                .histograms
                .iter()
                .map(|(name, hist)| (name.clone(), hist.counts.clone()))
                .collect(),
            gauges: self.gauges.clone(),
        }
    }

    fn qualify(&self, name: String) -> String {
        let namespace = if self.namespace.ends_with('.') {
            self.namespace.clone()
        } else {
            format!("{}.", self.namespace)
        };
        if name.starts_with(&namespace) {
            name
        } else {
            format!("{}{}", namespace, name)
        }
    }
}

impl Histogram {
    /// Buckets grow by half from 1 up to `max_value`.
    pub fn canonical(max_value: u64) -> Self {
        let mut buckets = Vec::new();
        let mut current = 1u64;
        while current < max_value {
            buckets.push(current);
            current = (current as f64 * 1.5).ceil() as u64;
        }
        buckets.push(max_value);
        let counts = vec![0; buckets.len()];
        Self { buckets, counts }
    }

    pub fn observe(&mut self, value: u64) {
        if let Some(idx) = self.buckets.iter().position(|bucket| value <= *bucket) {
            self.counts[idx] = self.counts[idx].saturating_add(1);
        } else if let Some(last) = self.counts.last_mut() {
            *last = last.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, Vec<u64>>,
    pub gauges: BTreeMap<String, u64>,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown histogram {0}")]
    UnknownHistogram(String),
}
