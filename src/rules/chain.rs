use super::{RuleRef, TestRule};
use crate::failure::ConfigError;
use crate::statement::{Description, StatementRef};
use std::fmt;

/// An ordered, immutable composition of rules.
///
/// The rule passed to [`RuleChain::outer_rule`] wraps everything added
/// later; each [`RuleChain::around`] adds a new innermost rule.
#[derive(Clone, Default)]
pub struct RuleChain {
    // outermost first
    rules: Vec<RuleRef>,
}

impl RuleChain {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn outer_rule(rule: RuleRef) -> Self {
        Self { rules: vec![rule] }
    }

    /// Returns a new chain with `rule` as its innermost member.
    pub fn around(&self, rule: RuleRef) -> Self {
        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        rules.extend(self.rules.iter().cloned());
        rules.push(rule);
        Self { rules }
    }

    /// Like [`RuleChain::around`], for callers holding an optional rule.
    /// A missing rule is rejected here rather than when the test runs.
    pub fn try_around(&self, rule: Option<RuleRef>) -> Result<Self, ConfigError> {
        rule.map(|rule| self.around(rule)).ok_or(ConfigError::NullRule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[RuleRef] {
        &self.rules
    }
}

impl TestRule for RuleChain {
    fn apply(&self, base: StatementRef, description: &Description) -> StatementRef {
        super::apply_all(base, &self.rules, description)
    }
}

impl fmt::Debug for RuleChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleChain")
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::TestError;
    use crate::rules::from_fn as rule_fn;
    use crate::statement::{self, from_fn};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn logging_rule(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> RuleRef {
        rule_fn(move |base, _| {
            let log = Arc::clone(&log);
            from_fn(move || {
                log.lock().push(format!("starting {name}"));
                let result = base.evaluate();
                log.lock().push(format!("finished {name}"));
                result
            })
        })
    }

    #[test]
    fn chain_nests_in_addition_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = RuleChain::outer_rule(logging_rule("outer", log.clone()))
            .around(logging_rule("middle", log.clone()))
            .around(logging_rule("inner", log.clone()));
        let description = Description::for_test("ChainTest", "nests");
        chain
            .apply(statement::passing(), &description)
            .evaluate()
            .unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "starting outer",
                "starting middle",
                "starting inner",
                "finished inner",
                "finished middle",
                "finished outer",
            ]
        );
    }

    #[test]
    fn around_leaves_original_chain_untouched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let base = RuleChain::outer_rule(logging_rule("outer", log.clone()));
        let extended = base.around(logging_rule("inner", log));
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn empty_chain_returns_base() {
        let base = from_fn(|| Err(TestError::fail("base")));
        let applied = RuleChain::empty().apply(base.clone(), &Description::for_suite("Empty"));
        assert!(Arc::ptr_eq(&base, &applied));
    }

    #[test]
    fn missing_rule_is_rejected_at_construction() {
        let err = RuleChain::empty().try_around(None).unwrap_err();
        assert!(matches!(err, ConfigError::NullRule));
        assert_eq!(err.to_string(), "the enclosed rule must not be null");
    }
}
