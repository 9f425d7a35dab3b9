//! Bounded retry policies with backoff.
//!
//! [`RetryPolicy::decision`] turns a policy into a [`RetryDecision`] for the
//! [`Retry`](crate::rules::Retry) rule: it accepts failures until the
//! attempt budget or time budget runs out, sleeping the backoff delay
//! between attempts.

use crate::cancel;
use crate::failure::TestError;
use crate::rules::retry::RetryDecision;
use log::debug;
use parking_lot::Mutex;
use rand::{thread_rng, Rng};
use std::time::{Duration, Instant};

/// How the pause between attempts grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryStrategy {
    /// `base * n` before the n-th retry.
    Linear,
    /// `base * 2^(n-1)` before the n-th retry.
    Exponential,
}

impl RetryStrategy {
    fn raw_delay(self, base: Duration, retry: u32) -> Duration {
        match self {
            RetryStrategy::Linear => base.saturating_mul(retry),
            RetryStrategy::Exponential => {
                let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        }
    }
}

/// Attempt and time limits for re-running a failing statement.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter: f64,
    skip_first_delay: bool,
    time_budget: Option<Duration>,
}

impl RetryPolicy {
    pub fn linear(max_attempts: usize, base_delay: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Linear, max_attempts, base_delay)
    }

    pub fn exponential(max_attempts: usize, base_delay: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Exponential, max_attempts, base_delay)
    }

    /// Up to `max_attempts` evaluations with no delay between them.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::linear(max_attempts, Duration::ZERO)
    }

    pub fn with_strategy(
        strategy: RetryStrategy,
        max_attempts: usize,
        base_delay: Duration,
    ) -> Self {
        Self {
            strategy,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: None,
            jitter: 0.0,
            skip_first_delay: false,
            time_budget: None,
        }
    }

    /// Caps every delay; zero removes the cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay).filter(|cap| !cap.is_zero());
        self
    }

    /// Spreads each delay uniformly over `delay * (1 ± fraction)`.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn with_skip_first_delay(mut self, skip: bool) -> Self {
        self.skip_first_delay = skip;
        self
    }

    /// Stops retrying once `budget` has elapsed since the first attempt.
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget.filter(|duration| !duration.is_zero());
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn strategy(&self) -> RetryStrategy {
        self.strategy
    }

    pub fn handle(&self) -> RetryHandle {
        self.handle_from(Instant::now())
    }

    pub fn handle_from(&self, start: Instant) -> RetryHandle {
        RetryHandle {
            deadline: self
                .time_budget
                .and_then(|budget| start.checked_add(budget)),
            policy: self.clone(),
            retries: 0,
        }
    }

    pub fn decision(&self) -> PolicyDecision {
        PolicyDecision {
            policy: self.clone(),
            handle: Mutex::new(None),
        }
    }

    fn delay_before(&self, retry: usize) -> Duration {
        if self.skip_first_delay && retry == 1 {
            return Duration::ZERO;
        }
        let retry = u32::try_from(retry).unwrap_or(u32::MAX);
        let delay = self.strategy.raw_delay(self.base_delay, retry);
        let delay = self.max_delay.map_or(delay, |cap| delay.min(cap));
        if delay.is_zero() || self.jitter == 0.0 {
            return delay;
        }
        let factor = thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        delay.mul_f64(factor)
    }
}

/// Tracks the retries made under one policy.
#[derive(Debug)]
pub struct RetryHandle {
    policy: RetryPolicy,
    retries: usize,
    deadline: Option<Instant>,
}

impl RetryHandle {
    /// The delay before the next attempt, or `None` once either budget is
    /// spent. A delay that would end past the deadline also ends retrying.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let next = self.retries + 1;
        if next >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_before(next);
        if let Some(deadline) = self.deadline {
            let resume_at = Instant::now().checked_add(delay)?;
            if resume_at >= deadline {
                return None;
            }
        }
        self.retries = next;
        Some(delay)
    }

    /// Retries granted so far.
    pub fn attempts(&self) -> usize {
        self.retries
    }
}

/// A [`RetryDecision`] bounded by a [`RetryPolicy`]. The attempt budget is
/// reset after each success or give-up, so one decision can serve
/// repeated runs.
pub struct PolicyDecision {
    policy: RetryPolicy,
    handle: Mutex<Option<RetryHandle>>,
}

impl RetryDecision for PolicyDecision {
    fn should_retry(&self, failure: &TestError, attempt: usize) -> bool {
        let delay = {
            let mut slot = self.handle.lock();
            let handle = slot.get_or_insert_with(|| self.policy.handle());
            match handle.next_delay() {
                Some(delay) => delay,
                None => {
                    *slot = None;
                    debug!("event=retry_budget_exhausted attempt={attempt} error={failure}");
                    return false;
                }
            }
        };
        if delay.is_zero() {
            return true;
        }
        if cancel::sleep(delay).is_err() {
            *self.handle.lock() = None;
            return false;
        }
        true
    }

    fn on_success(&self, _attempts: usize) {
        *self.handle.lock() = None;
    }
}
