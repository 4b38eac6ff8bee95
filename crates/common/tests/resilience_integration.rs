//! Integration tests for the retry executor's timing behavior.
//!
//! Run with a paused clock so the backoff sequence can be asserted exactly
//! without real waiting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dropshelf_common::resilience::{retry, RetryConfig};

#[tokio::test(start_paused = true)]
async fn default_policy_backs_off_1000_2000_4000() {
    let start = tokio::time::Instant::now();
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);

    let outcome = retry(RetryConfig::default(), || {
        let c = Arc::clone(&counter_clone);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("always fails".to_string())
        }
    })
    .await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.retries, 3);
    assert_eq!(counter.load(Ordering::SeqCst), 4);

    // 1000 + 2000 + 4000 ms of backoff, nothing more.
    assert_eq!(start.elapsed(), Duration::from_millis(7000));
}

#[tokio::test(start_paused = true)]
async fn success_on_first_attempt_sleeps_zero() {
    let start = tokio::time::Instant::now();

    let outcome =
        retry(RetryConfig::default(), || async { Ok::<_, String>("immediate") }).await;

    assert_eq!(outcome.result, Ok("immediate"));
    assert_eq!(outcome.retries, 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}
