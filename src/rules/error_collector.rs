//! Collects failures during a test and reports them together at the end.
//!
//! ```ignore
//! let collector = ErrorCollector::new();
//! let rules = RuleSet::new().rule(Arc::new(collector.clone()));
//! // in the body
//! collector.check_eq("rows", rows.len(), 3);
//! collector.check_succeeds(|| load_fixture());
//! ```
//!
//! The list is behind a lock, so checks may be recorded from any thread.

use super::TestRule;
use crate::failure::{AssertionFailure, ConfigError, MultipleFailures, TestError};
use crate::statement::{catch_panic, from_fn, Description, StatementRef};
use log::debug;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ErrorCollector {
    errors: Arc<Mutex<Vec<TestError>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` and lets the test continue. Skip signals are not
    /// failures and are refused with [`ConfigError::SkipNotCollectable`].
    pub fn add_error(&self, error: TestError) -> Result<(), TestError> {
        if let TestError::Skipped(skip) = error {
            return Err(ConfigError::SkipNotCollectable {
                reason: skip.reason().to_string(),
            }
            .into());
        }
        self.errors.lock().push(error);
        Ok(())
    }

    /// Used by the `check_*` helpers, which cannot hand a refusal back to
    /// the caller: a skip observed there is recorded as a configuration
    /// failure instead.
    fn collect(&self, error: TestError) {
        if let Err(refused) = self.add_error(error) {
            self.errors.lock().push(refused);
        }
    }

    pub fn check_that<T, P>(&self, reason: &str, actual: &T, predicate: P)
    where
        T: Debug + ?Sized,
        P: FnOnce(&T) -> bool,
    {
        if !predicate(actual) {
            self.collect(TestError::fail(format!("{reason}\nactual: {actual:?}")));
        }
    }

    pub fn check_eq<T>(&self, reason: &str, actual: T, expected: T)
    where
        T: Debug + PartialEq,
    {
        if actual != expected {
            self.collect(TestError::fail(format!(
                "{reason}\nexpected: {expected:?}\n  actual: {actual:?}"
            )));
        }
    }

    /// Runs `check`, returning its value or recording its failure.
    pub fn check_succeeds<T, F>(&self, check: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, TestError>,
    {
        match catch_panic(check) {
            Ok(value) => Some(value),
            Err(err) => {
                self.collect(err);
                None
            }
        }
    }

    /// Runs `check`, which is expected to fail in a way `expected` accepts.
    /// Returns the accepted failure; anything else is recorded.
    pub fn check_throws<F, P>(&self, expected: P, check: F) -> Option<TestError>
    where
        F: FnOnce() -> Result<(), TestError>,
        P: FnOnce(&TestError) -> bool,
    {
        match catch_panic(check) {
            Ok(()) => {
                self.collect(TestError::fail(
                    "expected the check to fail, but it completed normally",
                ));
                None
            }
            Err(err) if expected(&err) => Some(err),
            Err(err) => {
                self.collect(
                    AssertionFailure::with_cause("unexpected failure from check", err).into(),
                );
                None
            }
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Drains the collected failures: none passes, one is returned as-is,
    /// several become a [`MultipleFailures`].
    pub fn verify(&self) -> Result<(), TestError> {
        let errors = std::mem::take(&mut *self.errors.lock());
        MultipleFailures::assert_empty(errors)
    }

    fn finish(&self, base_result: Result<(), TestError>) -> Result<(), TestError> {
        let mut errors = std::mem::take(&mut *self.errors.lock());
        debug!("event=error_collector_verify collected={}", errors.len());
        match base_result {
            Ok(()) => {}
            Err(err) if err.is_skip() && errors.is_empty() => return Err(err),
            Err(err) => errors.push(err),
        }
        MultipleFailures::assert_empty(errors)
    }
}

impl TestRule for ErrorCollector {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        let collector = self.clone();
        from_fn(move || {
            let result = base.evaluate();
            collector.finish(result)
        })
    }
}
