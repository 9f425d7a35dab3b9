//! Failure taxonomy for statement evaluation.
//!
//! Every statement yields `Result<(), TestError>`. Skips are a dedicated
//! variant rather than a specially-typed failure, so aggregation and
//! reporting can match on them directly.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single evaluation, as handed to the reporting layer.
#[derive(Debug)]
pub enum Outcome {
    Passed,
    Skipped(AssumptionViolated),
    Failed(TestError),
}

impl Outcome {
    pub fn from_result(result: Result<(), TestError>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(TestError::Skipped(skip)) => Outcome::Skipped(skip),
            Err(err) => Outcome::Failed(err),
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Passed => OutcomeStatus::Passed,
            Outcome::Skipped(_) => OutcomeStatus::Skipped,
            Outcome::Failed(TestError::TimedOut(_)) => OutcomeStatus::TimedOut,
            Outcome::Failed(_) => OutcomeStatus::Failed,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn failure(&self) -> Option<&TestError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

#[derive(Debug, Error)]
pub enum TestError {
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    #[error(transparent)]
    Panicked(#[from] PanicFailure),
    #[error(transparent)]
    Skipped(#[from] AssumptionViolated),
    #[error(transparent)]
    CouldNotBeSkipped(#[from] CouldNotBeSkipped),
    #[error(transparent)]
    TimedOut(#[from] TestTimedOut),
    #[error("test was interrupted")]
    Interrupted,
    #[error(transparent)]
    Multiple(#[from] MultipleFailures),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync + 'static>),
}

impl TestError {
    /// Ordinary assertion failure with the given message.
    pub fn fail(message: impl Into<String>) -> Self {
        TestError::Assertion(AssertionFailure::new(message))
    }

    /// Skip signal: the test is inapplicable, not broken.
    pub fn skip(reason: impl Into<String>) -> Self {
        TestError::Skipped(AssumptionViolated::new(reason))
    }

    pub fn other<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TestError::Other(Box::new(err))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, TestError::Skipped(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TestError::TimedOut(_))
    }

    /// Short label used when an aggregate enumerates its members.
    pub fn kind(&self) -> &'static str {
        match self {
            TestError::Assertion(_) => "assertion",
            TestError::Panicked(_) => "panic",
            TestError::Skipped(_) => "assumption",
            TestError::CouldNotBeSkipped(_) => "could-not-skip",
            TestError::TimedOut(_) => "timeout",
            TestError::Interrupted => "interrupted",
            TestError::Multiple(_) => "multiple",
            TestError::Config(_) => "config",
            TestError::Io(_) => "io",
            TestError::Other(_) => "error",
        }
    }

    /// Every underlying failure: the members of an aggregate, or `self`.
    pub fn failures(&self) -> Vec<&TestError> {
        match self {
            TestError::Multiple(multiple) => multiple.failures().iter().collect(),
            other => vec![other],
        }
    }

    /// The single cause for tooling that only understands one failure.
    pub fn primary_cause(&self) -> Option<&TestError> {
        match self {
            TestError::Multiple(multiple) => multiple.failures().first(),
            TestError::Assertion(failure) => failure.cause(),
            _ => None,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            TestError::Assertion(failure) => Some(failure.backtrace()),
            TestError::Panicked(failure) => Some(failure.backtrace()),
            _ => None,
        }
    }

    pub fn downcast_other_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            TestError::Other(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Misuse of the composition API. Reported where the misuse happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the enclosed rule must not be null")]
    NullRule,
    #[error("assumption failures cannot be collected as errors: {reason}")]
    SkipNotCollectable { reason: String },
    #[error("failed to spawn timed test worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("the temporary folder has not yet been created")]
    FolderNotCreated,
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

pub struct AssertionFailure {
    message: String,
    cause: Option<Box<TestError>>,
    backtrace: Backtrace,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: TestError) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&TestError> {
        self.cause.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionFailure")
            .field("message", &self.message)
            .field("cause", &self.cause)
            .finish()
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for AssertionFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// A panic raised by a test body, caught at the statement boundary.
pub struct PanicFailure {
    message: String,
    backtrace: Backtrace,
}

impl PanicFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "test body panicked with a non-string payload".to_string()
        };
        Self::new(message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for PanicFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicFailure")
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for PanicFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

impl StdError for PanicFailure {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct AssumptionViolated {
    reason: String,
}

impl AssumptionViolated {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A skip that was reported alongside real failures and so could not be
/// honoured as a skip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("test could not be skipped due to other failures: {}", .skip.reason())]
pub struct CouldNotBeSkipped {
    skip: AssumptionViolated,
}

impl CouldNotBeSkipped {
    pub fn new(skip: AssumptionViolated) -> Self {
        Self { skip }
    }

    pub fn skip(&self) -> &AssumptionViolated {
        &self.skip
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTimedOut {
    amount: u64,
    unit: TimeUnit,
    stuck_thread: Option<String>,
}

impl TestTimedOut {
    pub fn new(amount: u64, unit: TimeUnit) -> Self {
        Self {
            amount,
            unit,
            stuck_thread: None,
        }
    }

    pub fn with_stuck_thread(mut self, thread_name: impl Into<String>) -> Self {
        self.stuck_thread = Some(thread_name.into());
        self
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn duration(&self) -> Duration {
        self.unit.to_duration(self.amount)
    }

    pub fn stuck_thread(&self) -> Option<&str> {
        self.stuck_thread.as_deref()
    }
}

impl fmt::Display for TestTimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test timed out after {} {}", self.amount, self.unit)?;
        if let Some(thread) = &self.stuck_thread {
            write!(f, "; worker thread {thread:?} did not stop after interruption")?;
        }
        Ok(())
    }
}

impl StdError for TestTimedOut {}

/// Several independent failures from one execution, in the order they
/// were raised.
#[derive(Debug)]
pub struct MultipleFailures {
    failures: Vec<TestError>,
}

impl MultipleFailures {
    /// Builds an aggregate. Nested aggregates are flattened and skip
    /// signals become [`CouldNotBeSkipped`] failures. Callers outside the
    /// crate go through [`MultipleFailures::assert_empty`], which never
    /// wraps fewer than two failures.
    pub(crate) fn new(failures: Vec<TestError>) -> Self {
        let mut flattened = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                TestError::Multiple(nested) => flattened.extend(nested.failures),
                TestError::Skipped(skip) => {
                    flattened.push(TestError::CouldNotBeSkipped(CouldNotBeSkipped::new(skip)))
                }
                other => flattened.push(other),
            }
        }
        Self {
            failures: flattened,
        }
    }

    /// Zero failures pass, one failure is returned as-is, more become an
    /// aggregate.
    pub fn assert_empty(mut failures: Vec<TestError>) -> Result<(), TestError> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(TestError::Multiple(Self::new(failures))),
        }
    }

    pub fn failures(&self) -> &[TestError] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TestError> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for MultipleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "There were {} errors:", self.failures.len())?;
        for (idx, failure) in self.failures.iter().enumerate() {
            write!(f, "\n  {}) {}: {}", idx + 1, failure.kind(), failure)?;
            let mut source = StdError::source(failure);
            while let Some(cause) = source {
                write!(f, "\n     caused by: {cause}")?;
                source = cause.source();
            }
            if let Some(trace) = failure.backtrace() {
                if trace.status() == BacktraceStatus::Captured {
                    for line in trace.to_string().lines() {
                        write!(f, "\n       {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl StdError for MultipleFailures {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_empty_passes_without_failures() {
        assert!(MultipleFailures::assert_empty(Vec::new()).is_ok());
    }

    #[test]
    fn single_failure_is_not_wrapped() {
        let err = MultipleFailures::assert_empty(vec![TestError::fail("boom")]).unwrap_err();
        match err {
            TestError::Assertion(failure) => assert_eq!(failure.message(), "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn aggregate_lists_every_message() {
        let err = MultipleFailures::assert_empty(vec![
            TestError::fail("first failure"),
            TestError::fail("second failure"),
        ])
        .unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.starts_with("There were 2 errors:"));
        assert!(rendered.contains("first failure"));
        assert!(rendered.contains("second failure"));
        assert_eq!(err.failures().len(), 2);
        assert_eq!(err.primary_cause().unwrap().to_string(), "first failure");
    }

    #[test]
    fn nested_aggregates_flatten_and_skips_convert() {
        let inner = MultipleFailures::new(vec![TestError::fail("a"), TestError::fail("b")]);
        let outer = MultipleFailures::new(vec![
            TestError::Multiple(inner),
            TestError::skip("no network"),
        ]);
        assert_eq!(outer.len(), 3);
        assert!(matches!(
            outer.failures()[2],
            TestError::CouldNotBeSkipped(_)
        ));
        assert!(outer.failures().iter().all(|failure| !failure.is_skip()));
    }

    #[test]
    fn assert_empty_never_wraps_fewer_than_two() {
        assert!(Outcome::from_result(MultipleFailures::assert_empty(Vec::new())).is_passed());
        let single = Outcome::from_result(MultipleFailures::assert_empty(vec![
            TestError::fail("alone"),
        ]));
        assert_eq!(single.status(), OutcomeStatus::Failed);
        assert!(!matches!(single.failure(), Some(TestError::Multiple(_))));
        assert_eq!(single.failure().unwrap().to_string(), "alone");
    }

    #[test]
    fn cause_chain_is_rendered() {
        let failure = AssertionFailure::with_cause("outer", TestError::fail("root cause"));
        let rendered =
            MultipleFailures::new(vec![failure.into(), TestError::fail("other")]).to_string();
        assert!(rendered.contains("caused by: root cause"));
    }

    #[test]
    fn timeout_message_names_duration() {
        let err = TestTimedOut::new(250, TimeUnit::Milliseconds);
        assert_eq!(err.to_string(), "test timed out after 250 milliseconds");
        assert_eq!(err.duration(), Duration::from_millis(250));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let failure = PanicFailure::from_payload(Box::new("left != right"));
        assert_eq!(failure.message(), "left != right");
        let failure = PanicFailure::from_payload(Box::new(String::from("owned")));
        assert_eq!(failure.message(), "owned");
    }

    #[test]
    fn outcome_maps_skip_and_timeout() {
        let skipped = Outcome::from_result(Err(TestError::skip("offline")));
        assert_eq!(skipped.status(), OutcomeStatus::Skipped);
        let timed_out = Outcome::from_result(Err(TestTimedOut::new(1, TimeUnit::Seconds).into()));
        assert_eq!(timed_out.status(), OutcomeStatus::TimedOut);
        assert!(Outcome::from_result(Ok(())).is_passed());
    }
}
