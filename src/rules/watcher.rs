//! Observes a test's lifecycle without changing its outcome.
//!
//! Hook failures are not swallowed: they are reported together with the
//! body's own failure through [`MultipleFailures`].

use super::TestRule;
use crate::failure::{AssumptionViolated, MultipleFailures, TestError};
use crate::statement::{from_fn, Description, StatementRef};
use std::sync::Arc;

pub trait TestWatcher: Send + Sync + 'static {
    fn starting(&self, _description: &Description) -> Result<(), TestError> {
        Ok(())
    }

    fn succeeded(&self, _description: &Description) -> Result<(), TestError> {
        Ok(())
    }

    fn failed(&self, _error: &TestError, _description: &Description) -> Result<(), TestError> {
        Ok(())
    }

    fn skipped(
        &self,
        _skip: &AssumptionViolated,
        _description: &Description,
    ) -> Result<(), TestError> {
        Ok(())
    }

    fn finished(&self, _description: &Description) -> Result<(), TestError> {
        Ok(())
    }
}

/// Adapts a [`TestWatcher`] into a rule.
pub struct Watchman<W> {
    watcher: Arc<W>,
}

impl<W: TestWatcher> Watchman<W> {
    pub fn new(watcher: W) -> Self {
        Self::from_arc(Arc::new(watcher))
    }

    pub fn from_arc(watcher: Arc<W>) -> Self {
        Self { watcher }
    }

    pub fn watcher(&self) -> &Arc<W> {
        &self.watcher
    }
}

impl<W: TestWatcher> TestRule for Watchman<W> {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        statement(base, description.clone(), Arc::clone(&self.watcher))
    }
}

pub(crate) fn statement<W: TestWatcher>(
    base: StatementRef,
    description: Description,
    watcher: Arc<W>,
) -> StatementRef {
    from_fn(move || {
        let mut errors = Vec::new();
        let mut record = |result: Result<(), TestError>| {
            if let Err(err) = result {
                errors.push(err);
            }
        };
        record(watcher.starting(&description));
        match base.evaluate() {
            Ok(()) => record(watcher.succeeded(&description)),
            Err(TestError::Skipped(skip)) => {
                let hook = watcher.skipped(&skip, &description);
                record(Err(TestError::Skipped(skip)));
                record(hook);
            }
            Err(err) => {
                let hook = watcher.failed(&err, &description);
                record(Err(err));
                record(hook);
            }
        }
        record(watcher.finished(&description));
        MultipleFailures::assert_empty(errors)
    })
}
