//! Declares, from inside a test, the failure the rest of the test must
//! produce.
//!
//! A failure that satisfies every expectation turns the test into a pass.
//! A failure that does not is reported as an assertion failure with the
//! original attached as its cause. Skips are never matched.

use super::TestRule;
use crate::failure::{AssertionFailure, TestError};
use crate::statement::{from_fn, Description, StatementRef};
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&TestError) -> bool + Send + Sync>;

#[derive(Clone)]
struct Expectation {
    description: String,
    predicate: Predicate,
}

#[derive(Clone, Default)]
struct Expectations {
    matchers: Vec<Expectation>,
    missing_message: Option<String>,
}

impl Expectations {
    fn describe(&self) -> String {
        self.matchers
            .iter()
            .map(|expectation| expectation.description.as_str())
            .collect::<Vec<_>>()
            .join(" and ")
    }

    fn matches(&self, error: &TestError) -> bool {
        self.matchers
            .iter()
            .all(|expectation| (expectation.predicate)(error))
    }
}

#[derive(Clone, Default)]
pub struct ExpectedException {
    state: Arc<Mutex<Expectations>>,
}

impl ExpectedException {
    /// No failure expected until the test says otherwise.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn expect<P>(&self, description: impl Into<String>, predicate: P) -> &Self
    where
        P: Fn(&TestError) -> bool + Send + Sync + 'static,
    {
        self.state.lock().matchers.push(Expectation {
            description: description.into(),
            predicate: Arc::new(predicate),
        });
        self
    }

    /// Expects an [`TestError::Other`] wrapping an `E`.
    pub fn expect_other<E: StdError + 'static>(&self) -> &Self {
        self.expect(
            format!("an error of type {}", std::any::type_name::<E>()),
            |error| error.downcast_other_ref::<E>().is_some(),
        )
    }

    pub fn expect_message(&self, substring: impl Into<String>) -> &Self {
        let substring = substring.into();
        self.expect(
            format!("a message containing {substring:?}"),
            move |error| error.to_string().contains(&substring),
        )
    }

    pub fn expect_cause<P>(&self, description: impl Into<String>, predicate: P) -> &Self
    where
        P: Fn(&TestError) -> bool + Send + Sync + 'static,
    {
        let description = description.into();
        self.expect(format!("a cause that is {description}"), move |error| {
            error.primary_cause().is_some_and(|cause| predicate(cause))
        })
    }

    /// Replaces the default message used when no failure was raised.
    pub fn report_missing_exception_with_message(&self, message: impl Into<String>) -> &Self {
        self.state.lock().missing_message = Some(message.into());
        self
    }

    pub fn is_any_exception_expected(&self) -> bool {
        !self.state.lock().matchers.is_empty()
    }

    fn check(&self, result: Result<(), TestError>) -> Result<(), TestError> {
        // predicates may call back into this rule
        let state = self.state.lock().clone();
        match result {
            Ok(()) if state.matchers.is_empty() => Ok(()),
            Ok(()) => {
                let message = state
                    .missing_message
                    .clone()
                    .unwrap_or_else(|| format!("Expected test to throw {}", state.describe()));
                Err(TestError::fail(message))
            }
            Err(err) if err.is_skip() || state.matchers.is_empty() => Err(err),
            Err(err) if state.matches(&err) => Ok(()),
            Err(err) => {
                let message = format!("Expected: {}\n     but: was <{}>", state.describe(), err);
                Err(AssertionFailure::with_cause(message, err).into())
            }
        }
    }
}

impl TestRule for ExpectedException {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        let rule = self.clone();
        from_fn(move || {
            let result = base.evaluate();
            rule.check(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{self, from_fn};

    fn run(rule: &ExpectedException, body: StatementRef) -> Result<(), TestError> {
        rule.apply(body, &Description::for_test("ExpectTest", "body"))
            .evaluate()
    }

    #[test]
    fn nothing_expected_passes_through() {
        let rule = ExpectedException::none();
        run(&rule, statement::passing()).unwrap();
        let err = run(&rule, from_fn(|| Err(TestError::fail("plain")))).unwrap_err();
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn matching_failure_passes() {
        let rule = ExpectedException::none();
        let inner = rule.clone();
        let body = from_fn(move || {
            inner.expect_message("index out of range");
            Err(TestError::fail("index out of range: 7"))
        });
        run(&rule, body).unwrap();
    }

    #[test]
    fn missing_failure_is_reported() {
        let rule = ExpectedException::none();
        rule.expect_message("boom");
        let err = run(&rule, statement::passing()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected test to throw a message containing \"boom\""
        );
        rule.report_missing_exception_with_message("no boom");
        let err = run(&rule, statement::passing()).unwrap_err();
        assert_eq!(err.to_string(), "no boom");
    }

    #[test]
    fn mismatch_keeps_original_as_cause() {
        let rule = ExpectedException::none();
        rule.expect_message("expected text");
        let err = run(&rule, from_fn(|| Err(TestError::fail("other text")))).unwrap_err();
        assert!(err.to_string().contains("but: was <other text>"));
        assert_eq!(err.primary_cause().unwrap().to_string(), "other text");
    }

    #[test]
    fn typed_and_cause_expectations() {
        let rule = ExpectedException::none();
        rule.expect_other::<std::fmt::Error>();
        run(&rule, from_fn(|| Err(TestError::other(std::fmt::Error)))).unwrap();

        let rule = ExpectedException::none();
        rule.expect_cause("interrupted", |cause| matches!(cause, TestError::Interrupted));
        let body = from_fn(|| {
            Err(AssertionFailure::with_cause("wrapped", TestError::Interrupted).into())
        });
        run(&rule, body).unwrap();
    }

    #[test]
    fn predicate_may_query_the_rule() {
        let rule = ExpectedException::none();
        let observer = rule.clone();
        rule.expect("seen while expected", move |_| {
            observer.is_any_exception_expected()
        });
        run(&rule, from_fn(|| Err(TestError::fail("raised")))).unwrap();
    }

    #[test]
    fn skips_are_never_matched() {
        let rule = ExpectedException::none();
        rule.expect("anything", |_| true);
        let err = run(&rule, from_fn(|| Err(TestError::skip("offline")))).unwrap_err();
        assert!(err.is_skip());
    }
}
