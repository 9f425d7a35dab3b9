//! Miscellaneous shared helpers (retry policies).

pub mod retry;

pub use retry::{PolicyDecision, RetryHandle, RetryPolicy, RetryStrategy};
