use super::TestRule;
use crate::failure::TimeUnit;
use crate::statement::{Description, StatementRef};
use crate::statements::FailOnTimeout;
use crate::timeouts::DEFAULT_GRACE_PERIOD;
use std::sync::Arc;
use std::time::Duration;

/// Fails the wrapped statement when it runs longer than a fixed duration.
///
/// The statement runs on a separate worker thread. Rules applied outside
/// `Timeout` run on the caller's thread; rules inside run on the worker.
#[derive(Clone, Debug)]
pub struct Timeout {
    amount: u64,
    unit: TimeUnit,
    grace_period: Duration,
    lookup_for_stuck_thread: bool,
}

#[derive(Clone, Debug)]
pub struct TimeoutBuilder {
    amount: u64,
    unit: TimeUnit,
    grace_period: Duration,
    lookup_for_stuck_thread: bool,
}

impl Default for TimeoutBuilder {
    fn default() -> Self {
        Self {
            amount: 0,
            unit: TimeUnit::Milliseconds,
            grace_period: DEFAULT_GRACE_PERIOD,
            lookup_for_stuck_thread: false,
        }
    }
}

impl TimeoutBuilder {
    pub fn with_timeout(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.amount = amount;
        self.unit = unit;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_lookup_for_stuck_thread(mut self, enable: bool) -> Self {
        self.lookup_for_stuck_thread = enable;
        self
    }

    pub fn build(self) -> Timeout {
        Timeout {
            amount: self.amount,
            unit: self.unit,
            grace_period: self.grace_period,
            lookup_for_stuck_thread: self.lookup_for_stuck_thread,
        }
    }
}

impl Timeout {
    pub fn builder() -> TimeoutBuilder {
        TimeoutBuilder::default()
    }

    pub fn new(amount: u64, unit: TimeUnit) -> Self {
        Self::builder().with_timeout(amount, unit).build()
    }

    pub fn millis(millis: u64) -> Self {
        Self::new(millis, TimeUnit::Milliseconds)
    }

    pub fn seconds(seconds: u64) -> Self {
        Self::new(seconds, TimeUnit::Seconds)
    }

    pub fn timeout(&self) -> Duration {
        self.unit.to_duration(self.amount)
    }

    pub fn is_lookup_for_stuck_thread(&self) -> bool {
        self.lookup_for_stuck_thread
    }
}

impl TestRule for Timeout {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        Arc::new(
            FailOnTimeout::builder()
                .with_timeout(self.amount, self.unit)
                .with_grace_period(self.grace_period)
                .with_lookup_for_stuck_thread(self.lookup_for_stuck_thread)
                .build(base),
        )
    }
}
