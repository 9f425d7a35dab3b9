//! Rule capabilities and the stock rules built on them.
//!
//! A rule turns an inner statement into an outer one. [`TestRule`] only
//! needs the [`Description`]; [`MethodRule`] also sees the test instance.
//! Both are folded into statements without evaluating anything.

pub mod chain;
pub mod disable_on_debug;
pub mod error_collector;
pub mod expected_exception;
pub mod external_resource;
pub mod order;
pub mod retry;
pub mod stopwatch;
pub mod temporary_folder;
pub mod test_name;
pub mod timeout;
pub mod verifier;
pub mod watcher;

use crate::statement::{Description, StatementRef, TestTarget};
use std::sync::Arc;

pub use chain::RuleChain;
pub use disable_on_debug::DisableOnDebug;
pub use error_collector::ErrorCollector;
pub use expected_exception::ExpectedException;
pub use external_resource::{ExternalResource, Resource};
pub use order::{resolve, PrioritizedRule};
pub use retry::{Retry, RetryDecision};
pub use stopwatch::{Clock, Stopwatch, StopwatchListener, SystemClock};
pub use temporary_folder::TemporaryFolder;
pub use test_name::TestName;
pub use timeout::{Timeout, TimeoutBuilder};
pub use verifier::Verifier;
pub use watcher::{TestWatcher, Watchman};

pub trait TestRule: Send + Sync {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef;
}

pub trait MethodRule: Send + Sync {
    fn apply(
        &self,
        base: StatementRef,
        description: &Description,
        target: &TestTarget,
    ) -> StatementRef;
}

pub type RuleRef = Arc<dyn TestRule>;
pub type MethodRuleRef = Arc<dyn MethodRule>;

/// A [`MethodRule`] closed over its target so it can sit in a chain.
pub struct BoundMethodRule {
    rule: MethodRuleRef,
    target: TestTarget,
}

impl BoundMethodRule {
    pub fn new(rule: MethodRuleRef, target: TestTarget) -> Self {
        Self { rule, target }
    }
}

impl TestRule for BoundMethodRule {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        self.rule.apply(base, description, &self.target)
    }
}

struct FnRule<F> {
    wrap: F,
}

impl<F> TestRule for FnRule<F>
where
    F: Fn(StatementRef, &Description) -> StatementRef + Send + Sync,
{
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        (self.wrap)(base, description)
    }
}

/// Adapts a wrapping closure into a rule.
pub fn from_fn<F>(wrap: F) -> RuleRef
where
    F: Fn(StatementRef, &Description) -> StatementRef + Send + Sync + 'static,
{
    Arc::new(FnRule { wrap })
}

/// Applies `rules` around `base`; the first rule ends up outermost.
pub fn apply_all(base: StatementRef, rules: &[RuleRef], description: &Description) -> StatementRef {
    rules
        .iter()
        .rev()
        .fold(base, |statement, rule| rule.apply(statement, description))
}
