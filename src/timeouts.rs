//! Timeout defaults shared by timed statements and the suite harness.

use std::time::Duration;

/// How long a timed-out worker is given to observe cancellation before the
/// timeout is reported.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Thread name used for workers spawned by timed statements.
pub const WORKER_THREAD_NAME: &str = "time-limited-test";

/// Default amount of time a harness test may run; zero disables the limit.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::ZERO;

/// How often a nested timed statement's caller checks whether an enclosing
/// deadline has interrupted it.
pub const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
