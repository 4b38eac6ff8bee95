//! Common utilities shared across Dropshelf crates.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types for convenience
pub use resilience::{
    retry, AlwaysRetry, PredicateRetry, RetryConfig, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy, RetryResult,
};
