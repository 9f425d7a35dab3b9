//! Cooperative cancellation for timed statements.
//!
//! A timed statement runs on a worker thread that has a current
//! [`CancellationToken`] installed. Test bodies poll it through
//! [`is_interrupted`], [`check`] or [`sleep`]. Nothing forces a thread to
//! stop: a body that never polls keeps running after its timeout has been
//! reported.

use crate::failure::TestError;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

thread_local! {
    static CURRENT: RefCell<Option<CancellationToken>> = const { RefCell::new(None) };
}

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    flags: Mutex<TokenFlags>,
    condvar: Condvar,
}

#[derive(Debug, Default)]
struct TokenFlags {
    cancelled: bool,
    children: Vec<Weak<TokenState>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled whenever this one is. Cancelling the child
    /// leaves the parent untouched.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut flags = self.inner.flags.lock();
        if flags.cancelled {
            drop(flags);
            child.cancel();
            return child;
        }
        flags.children.retain(|weak| weak.strong_count() > 0);
        flags.children.push(Arc::downgrade(&child.inner));
        child
    }

    pub fn cancel(&self) {
        let children = {
            let mut flags = self.inner.flags.lock();
            if flags.cancelled {
                return;
            }
            flags.cancelled = true;
            self.inner.condvar.notify_all();
            std::mem::take(&mut flags.children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            CancellationToken { inner: child }.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flags.lock().cancelled
    }

    /// Blocks for up to `timeout`, returning early once cancelled. Returns
    /// whether the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut flags = self.inner.flags.lock();
        while !flags.cancelled {
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => break,
                },
                None => Duration::from_secs(u32::MAX as u64),
            };
            self.inner.condvar.wait_for(&mut flags, remaining);
        }
        flags.cancelled
    }
}

/// Restores the previously installed token when dropped.
pub(crate) struct CurrentTokenGuard {
    previous: Option<CancellationToken>,
}

impl Drop for CurrentTokenGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

pub(crate) fn install(token: CancellationToken) -> CurrentTokenGuard {
    let previous = CURRENT.with(|current| current.borrow_mut().replace(token));
    CurrentTokenGuard { previous }
}

/// The token governing the current thread, if it runs a timed statement.
/// Nested timed statements derive their worker token from it with
/// [`CancellationToken::child`].
pub fn current() -> Option<CancellationToken> {
    CURRENT.with(|current| current.borrow().clone())
}

pub fn is_interrupted() -> bool {
    current().is_some_and(|token| token.is_cancelled())
}

/// Returns [`TestError::Interrupted`] once the current thread was asked to
/// stop.
pub fn check() -> Result<(), TestError> {
    if is_interrupted() {
        Err(TestError::Interrupted)
    } else {
        Ok(())
    }
}

/// Sleeps for `duration`, waking early with [`TestError::Interrupted`] when
/// the current thread is cancelled.
pub fn sleep(duration: Duration) -> Result<(), TestError> {
    match current() {
        Some(token) => {
            if token.wait_timeout(duration) {
                Err(TestError::Interrupted)
            } else {
                Ok(())
            }
        }
        None => {
            thread::sleep(duration);
            Ok(())
        }
    }
}
