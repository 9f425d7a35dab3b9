//! Executable units and the metadata handed to rules.

use crate::failure::{PanicFailure, TestError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A runnable unit with a single outcome.
///
/// Statements are shared behind [`StatementRef`] so a timed evaluation can
/// move one onto a worker thread and a retrying rule can evaluate its inner
/// statement more than once.
pub trait Statement: Send + Sync {
    fn evaluate(&self) -> Result<(), TestError>;
}

pub type StatementRef = Arc<dyn Statement>;

/// Closure-backed statement. Panics raised by the closure are reported as
/// [`TestError::Panicked`] so enclosing rules still unwind in order.
pub struct FnStatement<F> {
    body: F,
}

impl<F> Statement for FnStatement<F>
where
    F: Fn() -> Result<(), TestError> + Send + Sync,
{
    fn evaluate(&self) -> Result<(), TestError> {
        catch_panic(|| (self.body)())
    }
}

pub fn from_fn<F>(body: F) -> StatementRef
where
    F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
{
    Arc::new(FnStatement { body })
}

/// A statement that always passes.
pub fn passing() -> StatementRef {
    from_fn(|| Ok(()))
}

/// Runs `body`, converting a panic into a failure value.
pub(crate) fn catch_panic<T, F>(body: F) -> Result<T, TestError>
where
    F: FnOnce() -> Result<T, TestError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(TestError::Panicked(PanicFailure::from_payload(payload))),
    }
}

/// Names the suite or test a statement belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Description {
    class_name: String,
    method_name: Option<String>,
}

impl Description {
    pub fn for_suite(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: None,
        }
    }

    pub fn for_test(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: Some(method_name.into()),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    pub fn is_suite(&self) -> bool {
        self.method_name.is_none()
    }

    /// The suite this test belongs to.
    pub fn suite(&self) -> Description {
        Description::for_suite(self.class_name.clone())
    }

    pub fn display_name(&self) -> String {
        match &self.method_name {
            Some(method) => format!("{}({})", method, self.class_name),
            None => self.class_name.clone(),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// The per-test instance a method rule may inspect.
#[derive(Clone)]
pub struct TestTarget {
    instance: Arc<dyn Any + Send + Sync>,
}

impl TestTarget {
    pub fn new<T: Any + Send + Sync>(instance: T) -> Self {
        Self {
            instance: Arc::new(instance),
        }
    }

    pub fn from_arc(instance: Arc<dyn Any + Send + Sync>) -> Self {
        Self { instance }
    }

    /// Placeholder target for tests that have no fixture state.
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }
}

impl Default for TestTarget {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestTarget").finish_non_exhaustive()
    }
}
