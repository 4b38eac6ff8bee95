//! Bounded retry with deterministic exponential backoff.
//!
//! The executor runs an operation in an explicit loop with an attempt
//! counter, never by recursive self-invocation, so the retry count stays
//! observable and the call stack stays flat. Delays follow
//! `retry_delay * 2^attempt` with no jitter, capped at `max_delay`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by retry configuration validation.
#[derive(Debug, Error)]
pub enum RetryError {
    /// The retry configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Result type for retry operations: the error is the operation's own last
/// error, so callers can still inspect or rephrase its message.
pub type RetryResult<T, E> = Result<T, E>;

/// Outcome of a retry execution including the retry count.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    /// Number of retries performed (0 when the first attempt succeeded).
    pub retries: u32,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }
}

/// Trait for determining whether an error should be retried.
pub trait RetryPolicy<E> {
    /// Whether the given error, observed on the given 0-based attempt,
    /// warrants another try.
    fn should_retry(&self, error: &E, attempt: u32) -> bool;
}

/// Always retry policy - retries on any error.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysRetry;

impl<E> RetryPolicy<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E, _attempt: u32) -> bool {
        true
    }
}

/// Predicate-based retry policy.
#[derive(Debug)]
pub struct PredicateRetry<F> {
    predicate: F,
}

impl<F> PredicateRetry<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F, E> RetryPolicy<E> for PredicateRetry<F>
where
    F: Fn(&E, u32) -> bool,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        (self.predicate)(error, attempt)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay: Duration,
    /// Upper bound applied to every computed backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a configuration with the given retry count and base delay.
    #[must_use]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self { max_retries, retry_delay, ..Self::default() }
    }

    /// Override the backoff cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Compute the backoff delay for the given 0-based attempt:
    /// `retry_delay * 2^attempt`, saturating at `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let multiplier = 1u32 << shift;
        self.retry_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RetryError> {
        if self.max_delay < self.retry_delay {
            return Err(RetryError::InvalidConfiguration {
                message: "max_delay must be at least retry_delay".to_string(),
            });
        }
        Ok(())
    }
}

/// The retry executor: runs an operation, sleeping between failed attempts.
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy.
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration.
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    /// Execute an operation with retry logic and return the outcome.
    ///
    /// Attempt N+1 never starts before attempt N's failure and backoff delay
    /// have both been observed. On exhaustion the last error is returned
    /// as-is together with the retry count.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, max = self.config.max_retries + 1, "executing operation");

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return RetryOutcome { result: Ok(value), retries: attempt };
                }
                Err(error) => {
                    if attempt >= self.config.max_retries
                        || !self.policy.should_retry(&error, attempt)
                    {
                        warn!(
                            retries = attempt,
                            error = %error,
                            "operation failed terminally"
                        );
                        return RetryOutcome { result: Err(error), retries: attempt };
                    }

                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Convenience function: retry an operation with the given configuration,
/// retrying on every error.
pub async fn retry<F, Fut, T, E>(config: RetryConfig, operation: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    RetryExecutor::new(config, AlwaysRetry).execute(operation).await
}
