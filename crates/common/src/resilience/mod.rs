//! Resilience primitives for operations that may fail transiently.
//!
//! Currently this is the bounded-backoff retry executor used by the client
//! pipeline's mutation and query executors.

pub mod retry;

pub use retry::{
    retry, AlwaysRetry, PredicateRetry, RetryConfig, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy, RetryResult,
};
