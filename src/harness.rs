//! Runs registered test cases through their rules and writes a JSON report.

use crate::config::HarnessConfig;
use crate::failure::{Outcome, OutcomeStatus, TestError, TimeUnit};
use crate::rules::{apply_all, DisableOnDebug, RuleRef, TestRule, Timeout};
use crate::runner::RuleSet;
use crate::statement::{Description, Statement, StatementRef, TestTarget};
use crate::telemetry::{MetricsRegistry, MetricsSnapshot, TelemetryError, TESTS_REGISTERED};
use crate::timeouts::saturating_millis;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub struct TestCase {
    name: String,
    body: StatementRef,
    rules: RuleSet,
    target: TestTarget,
}

impl TestCase {
    pub fn new(name: impl Into<String>, body: StatementRef) -> Self {
        Self {
            name: name.into(),
            body,
            rules: RuleSet::new(),
            target: TestTarget::empty(),
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_target(mut self, target: TestTarget) -> Self {
        self.target = target;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct SuiteHarness {
    class_name: String,
    config: HarnessConfig,
    class_rules: Vec<RuleRef>,
    tests: Vec<TestCase>,
}

impl SuiteHarness {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            config: HarnessConfig::default(),
            class_rules: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a rule wrapping every test in the suite, outside the test's own
    /// rules. Earlier class rules are more outer.
    pub fn with_class_rule(mut self, rule: RuleRef) -> Self {
        self.class_rules.push(rule);
        self
    }

    pub fn with_test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    pub fn register(&mut self, test: TestCase) -> &mut Self {
        self.tests.push(test);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Builds the statement for one test. A configured default timeout sits
    /// outermost and is bypassed in debug mode.
    pub fn compose(&self, test: &TestCase) -> StatementRef {
        let description = Description::for_test(&self.class_name, &test.name);
        let suite = description.suite();
        let composed = test
            .rules
            .compose(Arc::clone(&test.body), &description, &test.target);
        let composed = apply_all(composed, &self.class_rules, &suite);
        match self.config.default_timeout() {
            Some(limit) => {
                let timeout: RuleRef = Arc::new(
                    Timeout::builder()
                        .with_timeout(
                            saturating_millis(limit),
                            TimeUnit::Milliseconds,
                        )
                        .with_grace_period(self.config.grace_period())
                        .with_lookup_for_stuck_thread(self.config.lookup_stuck_threads)
                        .build(),
                );
                DisableOnDebug::with_debugging(timeout, self.config.debug)
                    .apply(composed, &suite)
            }
            None => composed,
        }
    }

    pub fn run(
        &self,
        metrics: &mut MetricsRegistry,
        now: SystemTime,
    ) -> Result<SuiteReport, HarnessError> {
        if self.tests.is_empty() {
            return Err(HarnessError::NoTestsRegistered);
        }
        let generated_at_ms = saturating_millis(now.duration_since(UNIX_EPOCH)?);
        metrics.set_gauge(TESTS_REGISTERED, self.tests.len() as u64);
        let mut records = Vec::with_capacity(self.tests.len());
        for test in &self.tests {
            let statement = self.compose(test);
            let started = Instant::now();
            let outcome = Outcome::from_result(statement.evaluate());
            let elapsed = started.elapsed();
            let status = outcome.status();
            metrics.record_outcome(status, elapsed)?;
            if let Some(err) = outcome.failure() {
                warn!(
                    "event=test_failed suite={} test={} status={:?} error={}",
                    self.class_name,
                    test.name,
                    status,
                    first_line(err)
                );
            }
            records.push(TestRecord {
                name: test.name.clone(),
                status,
                duration_ms: saturating_millis(elapsed),
                message: describe(&outcome),
            });
        }
        let report = SuiteReport::new(self.class_name.clone(), generated_at_ms, records, metrics);
        info!(
            "event=suite_finished suite={} total={} passed={} failed={} skipped={} timed_out={}",
            report.suite,
            report.total,
            report.passed,
            report.failed,
            report.skipped,
            report.timed_out
        );
        if let Some(path) = &self.config.report_path {
            report.write_to(path)?;
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub generated_at_ms: u64,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub timed_out: u64,
    pub records: Vec<TestRecord>,
    pub metrics: MetricsSnapshot,
}

impl SuiteReport {
    fn new(
        suite: String,
        generated_at_ms: u64,
        records: Vec<TestRecord>,
        metrics: &MetricsRegistry,
    ) -> Self {
        let count = |status: OutcomeStatus| {
            records.iter().filter(|record| record.status == status).count() as u64
        };
        Self {
            suite,
            generated_at_ms,
            total: records.len() as u64,
            passed: count(OutcomeStatus::Passed),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
            timed_out: count(OutcomeStatus::TimedOut),
            metrics: metrics.snapshot(),
            records,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }

    pub fn record(&self, name: &str) -> Option<&TestRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let payload = serde_json::to_vec_pretty(self)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub status: OutcomeStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
}

fn describe(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Passed => None,
        Outcome::Skipped(skip) => Some(skip.reason().to_string()),
        Outcome::Failed(err) => Some(err.to_string()),
    }
}

fn first_line(err: &TestError) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no test cases registered")]
    NoTestsRegistered,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("system time error: {0}")]
    Time(#[from] std::time::SystemTimeError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
