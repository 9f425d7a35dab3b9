use super::TestRule;
use crate::failure::{AssumptionViolated, TestError};
use crate::statement::{from_fn, Description, StatementRef};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Receives the measured runtime once a test completes.
pub trait StopwatchListener: Send + Sync {
    fn succeeded(&self, _elapsed: Duration, _description: &Description) {}

    fn failed(&self, _elapsed: Duration, _error: &TestError, _description: &Description) {}

    fn skipped(&self, _elapsed: Duration, _skip: &AssumptionViolated, _description: &Description) {
    }

    fn finished(&self, _elapsed: Duration, _description: &Description) {}
}

struct NoopListener;

impl StopwatchListener for NoopListener {}

#[derive(Default)]
struct Timing {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

/// Measures how long the wrapped statement runs. The outcome is passed
/// through untouched.
#[derive(Clone)]
pub struct Stopwatch {
    clock: Arc<dyn Clock>,
    listener: Arc<dyn StopwatchListener>,
    timing: Arc<Mutex<Timing>>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            listener: Arc::new(NoopListener),
            timing: Arc::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StopwatchListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Elapsed time so far, or the final runtime once stopped. Zero if the
    /// stopwatch never started.
    pub fn runtime(&self) -> Duration {
        let timing = self.timing.lock();
        match (timing.started, timing.stopped) {
            (Some(started), Some(stopped)) => stopped.saturating_duration_since(started),
            (Some(started), None) => self.clock.now().saturating_duration_since(started),
            _ => Duration::ZERO,
        }
    }

    fn start(&self) {
        let mut timing = self.timing.lock();
        timing.started = Some(self.clock.now());
        timing.stopped = None;
    }

    fn stop(&self) -> Duration {
        self.timing.lock().stopped = Some(self.clock.now());
        self.runtime()
    }

    fn report(&self, result: &Result<(), TestError>, description: &Description) {
        let elapsed = self.stop();
        match result {
            Ok(()) => self.listener.succeeded(elapsed, description),
            Err(TestError::Skipped(skip)) => self.listener.skipped(elapsed, skip, description),
            Err(err) => self.listener.failed(elapsed, err, description),
        }
        self.listener.finished(elapsed, description);
    }
}

impl TestRule for Stopwatch {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        let stopwatch = self.clone();
        let description = description.clone();
        from_fn(move || {
            stopwatch.start();
            let result = base.evaluate();
            stopwatch.report(&result, &description);
            result
        })
    }
}
