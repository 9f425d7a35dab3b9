use super::{RuleRef, TestRule};
use crate::config;
use crate::statement::{Description, StatementRef};
use log::debug;

/// Bypasses the wrapped rule while debugging, so that e.g. a [`Timeout`]
/// does not fire while a test sits on a breakpoint.
///
/// [`Timeout`]: super::Timeout
pub struct DisableOnDebug {
    rule: RuleRef,
    debugging: bool,
}

impl DisableOnDebug {
    /// Reads debug mode from the `RULEKIT_DEBUG` environment variable.
    pub fn new(rule: RuleRef) -> Self {
        Self::with_debugging(rule, config::debug_mode())
    }

    pub fn with_debugging(rule: RuleRef, debugging: bool) -> Self {
        Self { rule, debugging }
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging
    }
}

impl TestRule for DisableOnDebug {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        if self.debugging {
            debug!("event=rule_disabled_on_debug test={description}");
            base
        } else {
            self.rule.apply(base, description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use crate::rules::Timeout;
    use crate::statement::from_fn;
    use std::sync::Arc;
    use std::time::Duration;

    fn slow_body() -> StatementRef {
        from_fn(|| cancel::sleep(Duration::from_millis(80)))
    }

    #[test]
    fn debugging_bypasses_rule() {
        let rule = DisableOnDebug::with_debugging(Arc::new(Timeout::millis(10)), true);
        rule.apply(slow_body(), &Description::for_test("DebugTest", "bypass"))
            .evaluate()
            .unwrap();
    }

    #[test]
    fn normal_runs_apply_rule() {
        let rule = DisableOnDebug::with_debugging(Arc::new(Timeout::millis(10)), false);
        let err = rule
            .apply(slow_body(), &Description::for_test("DebugTest", "applied"))
            .evaluate()
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
