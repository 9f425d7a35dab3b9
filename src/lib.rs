//! Rule-based test composition.
//! Rules wrap a test body in setup, teardown, timeouts and failure
//! aggregation without the body knowing about them.

pub mod cancel;
pub mod config;
pub mod failure;
pub mod harness;
pub mod prelude;
pub mod rules;
pub mod runner;
pub mod statement;
pub mod statements;
pub mod telemetry;
pub mod timeouts;
pub mod util;

pub use cancel::CancellationToken;
pub use config::HarnessConfig;
pub use failure::{
    AssertionFailure, AssumptionViolated, ConfigError, CouldNotBeSkipped, MultipleFailures,
    Outcome, OutcomeStatus, PanicFailure, TestError, TestTimedOut, TimeUnit,
};
pub use harness::{HarnessError, SuiteHarness, SuiteReport, TestCase, TestRecord};
pub use rules::{
    apply_all, resolve, BoundMethodRule, DisableOnDebug, ErrorCollector, ExpectedException,
    ExternalResource, MethodRule, MethodRuleRef, PrioritizedRule, Resource, Retry, RetryDecision,
    RuleChain, RuleRef, Stopwatch, StopwatchListener, TemporaryFolder, TestName, TestRule,
    TestWatcher, Timeout, TimeoutBuilder, Verifier, Watchman,
};
pub use runner::{RuleEntry, RuleSet, RunRules};
pub use statement::{from_fn, passing, Description, Statement, StatementRef, TestTarget};
pub use statements::{FailOnTimeout, FailOnTimeoutBuilder};
pub use telemetry::{MetricsRegistry, MetricsSnapshot, TelemetryError};
pub use util::{PolicyDecision, RetryHandle, RetryPolicy, RetryStrategy};
