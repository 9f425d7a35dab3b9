#![allow(dead_code)]

use parking_lot::Mutex;
use rulekit::{from_fn, Description, Statement, StatementRef, TestError, TestRule};
use std::sync::Arc;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn event_log() -> EventLog {
    Arc::default()
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

/// Logs `starting <name>` before and `finished <name>` after the wrapped
/// statement, whatever its outcome.
pub struct RecordingRule {
    name: String,
    log: EventLog,
}

impl RecordingRule {
    pub fn new(name: impl Into<String>, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            log: Arc::clone(log),
        })
    }
}

impl TestRule for RecordingRule {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        let name = self.name.clone();
        let log = Arc::clone(&self.log);
        from_fn(move || {
            log.lock().push(format!("starting {name}"));
            let result = base.evaluate();
            log.lock().push(format!("finished {name}"));
            result
        })
    }
}

/// A body that records `body` and then returns `result`.
pub fn recording_body(log: &EventLog, result: Result<(), TestError>) -> StatementRef {
    let log = Arc::clone(log);
    let result = Arc::new(Mutex::new(Some(result)));
    from_fn(move || {
        log.lock().push("body".to_string());
        result.lock().take().unwrap_or(Ok(()))
    })
}
