//! Re-evaluates a statement while a decision collaborator accepts its
//! failures.
//!
//! The loop has no bound of its own. A decision that always answers
//! `true` makes a statement that fails forever run forever; bounded
//! behaviour comes from the decision, e.g.
//! [`RetryPolicy::decision`](crate::util::RetryPolicy::decision).
//! Skips are never retried.

use super::TestRule;
use crate::failure::TestError;
use crate::statement::{from_fn, Description, StatementRef};
use log::debug;
use std::sync::Arc;

pub trait RetryDecision: Send + Sync {
    /// Called with each failure and the number of evaluations so far.
    fn should_retry(&self, failure: &TestError, attempt: usize) -> bool;

    fn on_success(&self, _attempts: usize) {}
}

impl<F> RetryDecision for F
where
    F: Fn(&TestError, usize) -> bool + Send + Sync,
{
    fn should_retry(&self, failure: &TestError, attempt: usize) -> bool {
        self(failure, attempt)
    }
}

pub struct Retry<D: ?Sized> {
    decision: Arc<D>,
}

impl<D: RetryDecision + 'static> Retry<D> {
    pub fn new(decision: D) -> Self {
        Self {
            decision: Arc::new(decision),
        }
    }
}

impl<D: RetryDecision + ?Sized + 'static> Retry<D> {
    pub fn from_arc(decision: Arc<D>) -> Self {
        Self { decision }
    }
}

impl<D: RetryDecision + ?Sized + 'static> TestRule for Retry<D> {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        let decision = Arc::clone(&self.decision);
        let test = description.display_name();
        from_fn(move || {
            let mut attempt = 0usize;
            loop {
                attempt += 1;
                match base.evaluate() {
                    Ok(()) => {
                        decision.on_success(attempt);
                        return Ok(());
                    }
                    Err(err) if err.is_skip() => return Err(err),
                    Err(err) => {
                        if !decision.should_retry(&err, attempt) {
                            return Err(err);
                        }
                        debug!("event=retry_attempt test={test} attempt={attempt} error={err}");
                    }
                }
            }
        })
    }
}
