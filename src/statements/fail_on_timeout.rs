//! Runs a statement on a worker thread under a deadline.
//!
//! The caller blocks on a completion channel, so it wakes as soon as the
//! worker reports rather than at the deadline. When the deadline passes
//! first the worker's [`CancellationToken`] is cancelled, the worker gets a
//! short grace period to wind down, and a [`TestTimedOut`] failure is
//! returned. Once the deadline has passed, the timeout is the reported
//! outcome even if the worker produced its own result during the grace
//! period; that late result is only logged.
//!
//! Inside another timed statement the worker token is a child of the
//! enclosing one, and the caller also stops waiting with
//! [`TestError::Interrupted`] when the enclosing deadline fires.
//!
//! Cancellation is cooperative. A worker that never polls its token keeps
//! running in the background after the timeout is reported.

use crate::cancel::{self, CancellationToken};
use crate::failure::{ConfigError, PanicFailure, TestError, TestTimedOut, TimeUnit};
use crate::statement::{Statement, StatementRef};
use crate::timeouts::{DEFAULT_GRACE_PERIOD, INTERRUPT_POLL_INTERVAL, WORKER_THREAD_NAME};
use log::{debug, warn};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct FailOnTimeout {
    base: StatementRef,
    amount: u64,
    unit: TimeUnit,
    grace_period: Duration,
    lookup_for_stuck_thread: bool,
}

#[derive(Clone, Debug)]
pub struct FailOnTimeoutBuilder {
    amount: u64,
    unit: TimeUnit,
    grace_period: Duration,
    lookup_for_stuck_thread: bool,
}

impl Default for FailOnTimeoutBuilder {
    fn default() -> Self {
        Self {
            amount: 0,
            unit: TimeUnit::Milliseconds,
            grace_period: DEFAULT_GRACE_PERIOD,
            lookup_for_stuck_thread: false,
        }
    }
}

impl FailOnTimeoutBuilder {
    /// Zero disables the deadline; the base then runs on the caller's thread.
    pub fn with_timeout(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.amount = amount;
        self.unit = unit;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Name the worker thread in the failure when it outlives the grace
    /// period.
    pub fn with_lookup_for_stuck_thread(mut self, enable: bool) -> Self {
        self.lookup_for_stuck_thread = enable;
        self
    }

    pub fn build(self, base: StatementRef) -> FailOnTimeout {
        FailOnTimeout {
            base,
            amount: self.amount,
            unit: self.unit,
            grace_period: self.grace_period,
            lookup_for_stuck_thread: self.lookup_for_stuck_thread,
        }
    }
}

impl FailOnTimeout {
    pub fn builder() -> FailOnTimeoutBuilder {
        FailOnTimeoutBuilder::default()
    }

    pub fn new(base: StatementRef, amount: u64, unit: TimeUnit) -> Self {
        Self::builder().with_timeout(amount, unit).build(base)
    }

    pub fn timeout(&self) -> Duration {
        self.unit.to_duration(self.amount)
    }

    fn spawn_worker(
        &self,
        token: CancellationToken,
    ) -> Result<(JoinHandle<()>, mpsc::Receiver<Result<(), TestError>>), TestError> {
        let (tx, rx) = mpsc::channel();
        let base = Arc::clone(&self.base);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _current = cancel::install(token);
                let result = base.evaluate();
                let _ = tx.send(result);
            })
            .map_err(ConfigError::WorkerSpawn)?;
        Ok((handle, rx))
    }

    fn timed_out(
        &self,
        token: &CancellationToken,
        handle: JoinHandle<()>,
        rx: &mpsc::Receiver<Result<(), TestError>>,
    ) -> TestError {
        token.cancel();
        warn!(
            "event=statement_timeout amount={} unit={} grace_ms={}",
            self.amount,
            self.unit,
            self.grace_period.as_millis()
        );
        match rx.recv_timeout(self.grace_period) {
            Ok(late) => {
                debug!(
                    "event=statement_timeout_late_outcome passed={}",
                    late.is_ok()
                );
                let _ = handle.join();
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if self.lookup_for_stuck_thread && !handle.is_finished() {
                    let name = handle
                        .thread()
                        .name()
                        .unwrap_or(WORKER_THREAD_NAME)
                        .to_string();
                    warn!("event=statement_worker_stuck thread={name}");
                    return TestTimedOut::new(self.amount, self.unit)
                        .with_stuck_thread(name)
                        .into();
                }
            }
        }
        TestTimedOut::new(self.amount, self.unit).into()
    }
}

impl FailOnTimeout {
    /// Waits for the worker until `timeout`, in slices when an enclosing
    /// token may interrupt the wait.
    fn wait_for_worker(
        &self,
        rx: &mpsc::Receiver<Result<(), TestError>>,
        timeout: Duration,
        enclosing: Option<&CancellationToken>,
    ) -> WorkerWait {
        let Some(enclosing) = enclosing else {
            return WorkerWait::Received(rx.recv_timeout(timeout));
        };
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if enclosing.is_cancelled() {
                return WorkerWait::Interrupted;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => INTERRUPT_POLL_INTERVAL,
            };
            if remaining.is_zero() {
                return WorkerWait::Received(Err(mpsc::RecvTimeoutError::Timeout));
            }
            match rx.recv_timeout(remaining.min(INTERRUPT_POLL_INTERVAL)) {
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                other => return WorkerWait::Received(other),
            }
        }
    }
}

enum WorkerWait {
    Received(Result<Result<(), TestError>, mpsc::RecvTimeoutError>),
    Interrupted,
}

impl Statement for FailOnTimeout {
    fn evaluate(&self) -> Result<(), TestError> {
        let timeout = self.timeout();
        if timeout.is_zero() {
            return self.base.evaluate();
        }
        // fresh token and channel per evaluation
        let enclosing = cancel::current();
        let token = match &enclosing {
            Some(parent) => parent.child(),
            None => CancellationToken::new(),
        };
        let (handle, rx) = self.spawn_worker(token.clone())?;
        match self.wait_for_worker(&rx, timeout, enclosing.as_ref()) {
            WorkerWait::Interrupted => {
                token.cancel();
                debug!(
                    "event=statement_interrupted_by_enclosing_deadline amount={} unit={}",
                    self.amount, self.unit
                );
                if rx.recv_timeout(self.grace_period).is_ok() {
                    let _ = handle.join();
                }
                Err(TestError::Interrupted)
            }
            WorkerWait::Received(Ok(result)) => {
                let _ = handle.join();
                result
            }
            WorkerWait::Received(Err(mpsc::RecvTimeoutError::Disconnected)) => {
                match handle.join() {
                    Err(payload) => Err(PanicFailure::from_payload(payload).into()),
                    Ok(()) => Err(TestError::fail(
                        "timed test worker exited without reporting an outcome",
                    )),
                }
            }
            WorkerWait::Received(Err(mpsc::RecvTimeoutError::Timeout)) => {
                Err(self.timed_out(&token, handle, &rx))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::from_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_timeout_runs_on_calling_thread() {
        let caller = thread::current().id();
        let statement = FailOnTimeout::new(
            from_fn(move || {
                if thread::current().id() == caller {
                    Ok(())
                } else {
                    Err(TestError::fail("ran on another thread"))
                }
            }),
            0,
            TimeUnit::Milliseconds,
        );
        statement.evaluate().unwrap();
    }

    #[test]
    fn fast_statement_reports_its_own_failure() {
        let statement = FailOnTimeout::new(
            from_fn(|| Err(TestError::fail("own failure"))),
            5,
            TimeUnit::Seconds,
        );
        match statement.evaluate() {
            Err(TestError::Assertion(failure)) => assert_eq!(failure.message(), "own failure"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn completion_wakes_caller_before_deadline() {
        let statement = FailOnTimeout::new(
            from_fn(|| {
                thread::sleep(Duration::from_millis(10));
                Ok(())
            }),
            30,
            TimeUnit::Seconds,
        );
        let started = Instant::now();
        statement.evaluate().unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cooperative_statement_is_interrupted() {
        let statement = FailOnTimeout::new(
            from_fn(|| cancel::sleep(Duration::from_secs(30))),
            50,
            TimeUnit::Milliseconds,
        );
        let err = statement.evaluate().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "test timed out after 50 milliseconds");
    }

    #[test]
    fn stuck_worker_is_named_when_requested() {
        let statement = FailOnTimeout::builder()
            .with_timeout(20, TimeUnit::Milliseconds)
            .with_grace_period(Duration::from_millis(10))
            .with_lookup_for_stuck_thread(true)
            .build(from_fn(|| {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            }));
        match statement.evaluate() {
            Err(TestError::TimedOut(timeout)) => {
                assert_eq!(timeout.stuck_thread(), Some(WORKER_THREAD_NAME));
                assert!(timeout.to_string().contains("20 milliseconds"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn statement_can_be_evaluated_again_after_timeout() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let statement = FailOnTimeout::new(
            from_fn(move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    cancel::sleep(Duration::from_secs(30))
                } else {
                    cancel::check()
                }
            }),
            50,
            TimeUnit::Milliseconds,
        );
        assert!(statement.evaluate().unwrap_err().is_timeout());
        statement.evaluate().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn enclosing_deadline_interrupts_nested_body() {
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let seen = Arc::clone(&observed);
        let inner: StatementRef = Arc::new(FailOnTimeout::new(
            from_fn(move || {
                let result = cancel::sleep(Duration::from_secs(30));
                *seen.lock() = Some(matches!(result, Err(TestError::Interrupted)));
                result
            }),
            3,
            TimeUnit::Seconds,
        ));
        let outer = FailOnTimeout::builder()
            .with_timeout(50, TimeUnit::Milliseconds)
            .with_grace_period(Duration::from_millis(500))
            .build(inner);
        let started = Instant::now();
        let err = outer.evaluate().unwrap_err();
        assert_eq!(err.to_string(), "test timed out after 50 milliseconds");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn nested_caller_stops_waiting_when_enclosing_token_fires() {
        let parent = CancellationToken::new();
        let remote = parent.clone();
        let waiter = thread::spawn(move || {
            let _current = cancel::install(remote);
            let started = Instant::now();
            let result = FailOnTimeout::new(
                from_fn(|| {
                    // ignores cancellation
                    thread::sleep(Duration::from_millis(400));
                    Ok(())
                }),
                30,
                TimeUnit::Seconds,
            )
            .evaluate();
            (result, started.elapsed())
        });
        thread::sleep(Duration::from_millis(30));
        parent.cancel();
        let (result, elapsed) = waiter.join().unwrap();
        assert!(matches!(result, Err(TestError::Interrupted)));
        assert!(elapsed < Duration::from_millis(350));
    }

    struct Panicking;

    impl Statement for Panicking {
        fn evaluate(&self) -> Result<(), TestError> {
            panic!("raw statement panic")
        }
    }

    #[test]
    fn worker_panic_outside_fn_statement_is_reported() {
        let statement = FailOnTimeout::new(Arc::new(Panicking), 5, TimeUnit::Seconds);
        match statement.evaluate() {
            Err(TestError::Panicked(failure)) => {
                assert_eq!(failure.message(), "raw statement panic")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
