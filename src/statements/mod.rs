//! Statements shared by several rules.

pub mod fail_on_timeout;

pub use fail_on_timeout::{FailOnTimeout, FailOnTimeoutBuilder};
