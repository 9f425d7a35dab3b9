//! Priority resolution for declared rules.
//!
//! Rules without a priority (or with a negative one) keep their declared
//! order. Rules with a priority of zero or more are gathered into a single
//! [`RuleChain`], highest priority outermost, which is appended after the
//! unprioritized rules. Equal priorities keep declaration order: the rule
//! declared first is the more outer one.

use super::{RuleChain, RuleRef};
use log::debug;
use std::sync::Arc;

#[derive(Clone)]
pub struct PrioritizedRule {
    pub rule: RuleRef,
    pub priority: Option<i32>,
}

impl PrioritizedRule {
    pub fn new(rule: RuleRef, priority: Option<i32>) -> Self {
        Self { rule, priority }
    }

    pub fn unordered(rule: RuleRef) -> Self {
        Self::new(rule, None)
    }

    pub fn with_priority(rule: RuleRef, priority: i32) -> Self {
        Self::new(rule, Some(priority))
    }

    fn explicit_priority(&self) -> Option<i32> {
        self.priority.filter(|priority| *priority >= 0)
    }
}

/// Returns the rules in application order, outermost first.
pub fn resolve(rules: Vec<PrioritizedRule>) -> Vec<RuleRef> {
    let mut unordered = Vec::with_capacity(rules.len());
    let mut prioritized = Vec::new();
    for entry in rules {
        match entry.explicit_priority() {
            Some(priority) => prioritized.push((priority, entry.rule)),
            None => unordered.push(entry.rule),
        }
    }
    if prioritized.is_empty() {
        return unordered;
    }
    // stable: ties keep declaration order
    prioritized.sort_by(|left, right| right.0.cmp(&left.0));
    debug!(
        "event=rule_priority_resolved unordered={} prioritized={}",
        unordered.len(),
        prioritized.len()
    );
    let chain = prioritized
        .into_iter()
        .fold(RuleChain::empty(), |chain, (_, rule)| chain.around(rule));
    unordered.push(Arc::new(chain));
    unordered
}
