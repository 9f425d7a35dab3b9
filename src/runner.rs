//! Applies a test's declared rules around its body.
//!
//! Method-scope rules wrap the raw body; class-scope rules wrap the result.
//! Within a scope, rules declared earlier are more outer unless a priority
//! says otherwise (see [`crate::rules::order`]).

use crate::failure::TestError;
use crate::rules::{
    apply_all, order, BoundMethodRule, MethodRule, MethodRuleRef, PrioritizedRule, RuleRef,
    TestRule,
};
use crate::statement::{Description, Statement, StatementRef, TestTarget};
use log::debug;
use std::sync::Arc;

/// A method-scope rule, resolved to one capability at registration.
#[derive(Clone)]
pub enum RuleEntry {
    Test(RuleRef),
    Method(MethodRuleRef),
}

impl RuleEntry {
    fn bind(&self, target: &TestTarget) -> RuleRef {
        match self {
            RuleEntry::Test(rule) => Arc::clone(rule),
            RuleEntry::Method(rule) => {
                Arc::new(BoundMethodRule::new(Arc::clone(rule), target.clone()))
            }
        }
    }
}

#[derive(Clone)]
struct ScopedEntry {
    entry: RuleEntry,
    priority: Option<i32>,
}

#[derive(Clone, Default)]
pub struct RuleSet {
    method_rules: Vec<ScopedEntry>,
    class_rules: Vec<PrioritizedRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(self, rule: RuleRef) -> Self {
        self.push_method(RuleEntry::Test(rule), None)
    }

    pub fn rule_with_priority(self, rule: RuleRef, priority: i32) -> Self {
        self.push_method(RuleEntry::Test(rule), Some(priority))
    }

    pub fn method_rule(self, rule: MethodRuleRef) -> Self {
        self.push_method(RuleEntry::Method(rule), None)
    }

    pub fn method_rule_with_priority(self, rule: MethodRuleRef, priority: i32) -> Self {
        self.push_method(RuleEntry::Method(rule), Some(priority))
    }

    /// Registers a rule implementing both capabilities. It is applied once,
    /// through its [`TestRule`] implementation.
    pub fn dual<R>(self, rule: Arc<R>) -> Self
    where
        R: TestRule + MethodRule + 'static,
    {
        self.rule(rule)
    }

    pub fn class_rule(mut self, rule: RuleRef) -> Self {
        self.class_rules.push(PrioritizedRule::unordered(rule));
        self
    }

    pub fn class_rule_with_priority(mut self, rule: RuleRef, priority: i32) -> Self {
        self.class_rules
            .push(PrioritizedRule::with_priority(rule, priority));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.method_rules.is_empty() && self.class_rules.is_empty()
    }

    pub fn method_rule_count(&self) -> usize {
        self.method_rules.len()
    }

    pub fn class_rule_count(&self) -> usize {
        self.class_rules.len()
    }

    fn push_method(mut self, entry: RuleEntry, priority: Option<i32>) -> Self {
        self.method_rules.push(ScopedEntry { entry, priority });
        self
    }

    /// Wraps `base` in the method-scope rules bound to `target`.
    pub fn apply_method_rules(
        &self,
        base: StatementRef,
        description: &Description,
        target: &TestTarget,
    ) -> StatementRef {
        let bound = self
            .method_rules
            .iter()
            .map(|scoped| PrioritizedRule::new(scoped.entry.bind(target), scoped.priority))
            .collect();
        let resolved = order::resolve(bound);
        debug!(
            "event=method_rules_apply test={} rules={}",
            description,
            resolved.len()
        );
        apply_all(base, &resolved, description)
    }

    /// Wraps `base` in the class-scope rules. No target is involved.
    pub fn apply_class_rules(&self, base: StatementRef, description: &Description) -> StatementRef {
        let resolved = order::resolve(self.class_rules.clone());
        debug!(
            "event=class_rules_apply suite={} rules={}",
            description,
            resolved.len()
        );
        apply_all(base, &resolved, description)
    }

    /// Composes the full statement for one test: method rules around the
    /// body, class rules around those.
    pub fn compose(
        &self,
        body: StatementRef,
        description: &Description,
        target: &TestTarget,
    ) -> StatementRef {
        let inner = self.apply_method_rules(body, description, target);
        self.apply_class_rules(inner, &description.suite())
    }
}

/// A statement built by applying a flat rule list around a base, first
/// rule outermost.
pub struct RunRules {
    statement: StatementRef,
}

impl RunRules {
    pub fn new(base: StatementRef, rules: &[RuleRef], description: &Description) -> Self {
        Self {
            statement: apply_all(base, rules, description),
        }
    }
}

impl Statement for RunRules {
    fn evaluate(&self) -> Result<(), TestError> {
        self.statement.evaluate()
    }
}
