use super::TestRule;
use crate::failure::TestError;
use crate::statement::{from_fn, Description, StatementRef};
use std::sync::Arc;

type VerifyFn = Arc<dyn Fn() -> Result<(), TestError> + Send + Sync>;

/// Runs an extra check after the body, turning a passing test into a
/// failing one when the check fails. Not run when the body already failed.
#[derive(Clone)]
pub struct Verifier {
    verify: VerifyFn,
}

impl Verifier {
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
    {
        Self {
            verify: Arc::new(verify),
        }
    }
}

impl TestRule for Verifier {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        let verify = Arc::clone(&self.verify);
        from_fn(move || {
            base.evaluate()?;
            verify()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn verify_failure_fails_passing_test() {
        let rule = Verifier::new(|| Err(TestError::fail("leaked handle")));
        let err = rule
            .apply(statement::passing(), &Description::for_test("V", "leak"))
            .evaluate()
            .unwrap_err();
        assert_eq!(err.to_string(), "leaked handle");
    }

    #[test]
    fn verify_is_skipped_after_body_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rule = Verifier::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let err = rule
            .apply(
                statement::from_fn(|| Err(TestError::fail("body"))),
                &Description::for_test("V", "body"),
            )
            .evaluate()
            .unwrap_err();
        assert_eq!(err.to_string(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
