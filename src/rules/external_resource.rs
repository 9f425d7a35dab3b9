use super::TestRule;
use crate::failure::{MultipleFailures, TestError};
use crate::statement::{from_fn, Description, StatementRef};
use std::sync::Arc;

/// Setup and teardown around a test.
///
/// `after` runs whenever `before` succeeded, whatever the body did. If
/// both the body and `after` fail, both failures are reported.
pub trait Resource: Send + Sync + 'static {
    fn before(&self) -> Result<(), TestError> {
        Ok(())
    }

    fn after(&self) -> Result<(), TestError> {
        Ok(())
    }
}

pub struct ExternalResource<R> {
    resource: Arc<R>,
}

impl<R: Resource> ExternalResource<R> {
    pub fn new(resource: R) -> Self {
        Self::from_arc(Arc::new(resource))
    }

    pub fn from_arc(resource: Arc<R>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Arc<R> {
        &self.resource
    }
}

impl<R: Resource> TestRule for ExternalResource<R> {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        statement(base, Arc::clone(&self.resource))
    }
}

pub(crate) fn statement<R: Resource>(base: StatementRef, resource: Arc<R>) -> StatementRef {
    from_fn(move || {
        resource.before()?;
        let mut errors = Vec::new();
        if let Err(err) = base.evaluate() {
            errors.push(err);
        }
        if let Err(err) = resource.after() {
            errors.push(err);
        }
        MultipleFailures::assert_empty(errors)
    })
}
