//! Convenience re-exports. Pull this module in via `use rulekit::prelude::*;`
//! to get the statement and rule types most tests need.

pub use crate::failure::{MultipleFailures, TestError, TimeUnit};
pub use crate::rules::{
    ErrorCollector, ExpectedException, MethodRule, RuleChain, RuleRef, TestRule, Timeout,
};
pub use crate::runner::RuleSet;
pub use crate::statement::{from_fn, Description, Statement, StatementRef, TestTarget};
