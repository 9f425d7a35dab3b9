use super::watcher::{self, TestWatcher};
use super::TestRule;
use crate::failure::TestError;
use crate::statement::{Description, StatementRef};
use parking_lot::Mutex;
use std::sync::Arc;

/// Makes the running test's name available inside the body.
#[derive(Clone, Default)]
pub struct TestName {
    name: Arc<Mutex<Option<String>>>,
}

impl TestName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method_name(&self) -> Option<String> {
        self.name.lock().clone()
    }
}

impl TestWatcher for TestName {
    fn starting(&self, description: &Description) -> Result<(), TestError> {
        *self.name.lock() = description.method_name().map(str::to_string);
        Ok(())
    }
}

impl TestRule for TestName {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        watcher::statement(base, description.clone(), Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::from_fn;

    #[test]
    fn body_sees_its_own_name() {
        let name = TestName::new();
        let observed = name.clone();
        name.apply(
            from_fn(move || match observed.method_name().as_deref() {
                Some("reads_name") => Ok(()),
                other => Err(TestError::fail(format!("unexpected name {other:?}"))),
            }),
            &Description::for_test("NameTest", "reads_name"),
        )
        .evaluate()
        .unwrap();
    }
}
