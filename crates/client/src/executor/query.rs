//! Stale-aware query executor
//!
//! Runs a read operation keyed by a dependency list. Re-running with the
//! same dependencies inside the staleness window serves the cached value
//! without touching the network; changed dependencies or an elapsed window
//! trigger a fetch. A generation counter discards results of fetches that
//! were superseded by a newer run before they resolved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dropshelf_common::{retry, RetryConfig};
use dropshelf_domain::{session_expired_message, DropshelfError, Result};
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default staleness window: five minutes.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Observable state of a query executor.
///
/// Like the mutation executor, `retry_count` is 0 unless the last fetch
/// failed terminally, in which case it reports the retries performed.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self { data: None, loading: false, error: None, retry_count: 0 }
    }
}

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&DropshelfError) + Send + Sync>;

/// Configuration for a query executor. Callbacks fire once per settled
/// fetch; a superseded fetch discards its result without firing either.
#[derive(Clone)]
pub struct QueryOptions<T> {
    /// When false, `run` is a no-op and the cached state is returned as-is.
    pub enabled: bool,
    /// Whether failed fetches are retried with backoff.
    pub retry: bool,
    /// How long a fetched value stays fresh.
    pub stale_time: Duration,
    /// Backoff configuration used when `retry` is set.
    pub retry_config: RetryConfig,
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: true,
            stale_time: DEFAULT_STALE_TIME,
            retry_config: RetryConfig::default(),
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> QueryOptions<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&DropshelfError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

type QueryOp<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Executes a read operation with dependency tracking and staleness.
pub struct QueryExecutor<T> {
    operation: QueryOp<T>,
    options: QueryOptions<T>,
    state: RwLock<QueryState<T>>,
    last_fetch: RwLock<Option<Instant>>,
    last_deps: RwLock<Option<Vec<serde_json::Value>>>,
    /// Incremented per fetch; a resolved fetch whose generation is no longer
    /// current is discarded.
    generation: AtomicU64,
}

impl<T> QueryExecutor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an executor over the given operation with default options.
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_options(operation, QueryOptions::default())
    }

    /// Create an executor with explicit options.
    pub fn with_options<F, Fut>(operation: F, options: QueryOptions<T>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let operation: QueryOp<T> =
            Arc::new(move || Box::pin(operation()) as BoxFuture<'static, Result<T>>);
        Self {
            operation,
            options,
            state: RwLock::new(QueryState::default()),
            last_fetch: RwLock::new(None),
            last_deps: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Run the query for the given dependency list.
    ///
    /// Serves the cached value when the dependencies are unchanged and the
    /// last fetch is still fresh; otherwise fetches and caches.
    pub async fn run(&self, deps: &[serde_json::Value]) -> QueryState<T> {
        if !self.options.enabled {
            return self.state.read().await.clone();
        }

        if self.is_fresh(deps).await {
            tracing::debug!("query is fresh, serving cached value");
            return self.state.read().await.clone();
        }

        self.fetch(deps).await
    }

    /// Force a fetch, bypassing the staleness window.
    ///
    /// Dependencies are kept from the last `run`; a refetch before any run
    /// fetches with an empty dependency list.
    pub async fn refetch(&self) -> QueryState<T> {
        *self.last_fetch.write().await = None;
        let deps = self.last_deps.read().await.clone().unwrap_or_default();
        self.fetch(&deps).await
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> QueryState<T> {
        self.state.read().await.clone()
    }

    async fn is_fresh(&self, deps: &[serde_json::Value]) -> bool {
        let same_deps = self.last_deps.read().await.as_deref() == Some(deps);
        if !same_deps {
            return false;
        }
        match *self.last_fetch.read().await {
            Some(at) => at.elapsed() < self.options.stale_time,
            None => false,
        }
    }

    async fn fetch(&self, deps: &[serde_json::Value]) -> QueryState<T> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }
        *self.last_deps.write().await = Some(deps.to_vec());

        let operation = Arc::clone(&self.operation);
        let (result, retries) = if self.options.retry {
            let outcome = retry(self.options.retry_config.clone(), || {
                let operation = Arc::clone(&operation);
                async move { operation().await }
            })
            .await;
            (outcome.result, outcome.retries)
        } else {
            (operation().await, 0)
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("query fetch superseded, discarding result");
            return self.state.read().await.clone();
        }

        match result {
            Ok(value) => {
                {
                    let mut state = self.state.write().await;
                    state.data = Some(value.clone());
                    state.loading = false;
                    state.error = None;
                    state.retry_count = 0;
                }
                *self.last_fetch.write().await = Some(Instant::now());
                if let Some(callback) = &self.options.on_success {
                    callback(&value);
                }
            }
            Err(error) => {
                let error = if error.is_auth_failure() {
                    DropshelfError::Auth(session_expired_message().to_string())
                } else {
                    error
                };
                {
                    let mut state = self.state.write().await;
                    state.loading = false;
                    state.error = Some(error.to_string());
                    state.retry_count = retries;
                }
                if let Some(callback) = &self.options.on_error {
                    callback(&error);
                }
            }
        }
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn deps(values: &[&str]) -> Vec<serde_json::Value> {
        values.iter().map(|v| serde_json::Value::String((*v).to_string())).collect()
    }

    #[tokio::test]
    async fn fetches_on_first_run() {
        let executor = QueryExecutor::new(|| async { Ok(7) });
        let state = executor.run(&deps(&["a"])).await;
        assert_eq!(state.data, Some(7));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn unchanged_deps_within_stale_time_skip_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::new(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });

        executor.run(&deps(&["a"])).await;
        executor.run(&deps(&["a"])).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_deps_trigger_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::new(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });

        executor.run(&deps(&["a"])).await;
        executor.run(&deps(&["b"])).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_stale_time_triggers_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::with_options(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            },
            QueryOptions::new().stale_time(Duration::from_secs(60)),
        );

        executor.run(&deps(&["a"])).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        executor.run(&deps(&["a"])).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_query_never_fetches() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::with_options(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            },
            QueryOptions::new().enabled(false),
        );

        let state = executor.run(&deps(&["a"])).await;
        assert!(state.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refetch_bypasses_staleness() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::new(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });

        executor.run(&deps(&["a"])).await;
        executor.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_error_is_recorded_without_clobbering_data() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::with_options(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(5)
                    } else {
                        Err(DropshelfError::Network("down".to_string()))
                    }
                }
            },
            QueryOptions::new().retry(false),
        );

        executor.run(&deps(&["a"])).await;
        let state = executor.run(&deps(&["b"])).await;

        assert_eq!(state.data, Some(5));
        assert!(state.error.as_deref().unwrap().contains("down"));
    }

    #[tokio::test]
    async fn callbacks_observe_fetch_outcomes() {
        let seen = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);
        let errors_clone = Arc::clone(&errors);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let executor = QueryExecutor::with_options(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(7)
                    } else {
                        Err(DropshelfError::Network("down".to_string()))
                    }
                }
            },
            QueryOptions::new()
                .retry(false)
                .on_success(move |value: &u32| seen_clone.store(*value, Ordering::SeqCst))
                .on_error(move |_| {
                    errors_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );

        executor.run(&deps(&["a"])).await;
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(errors.load(Ordering::SeqCst), 0);

        executor.run(&deps(&["b"])).await;
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_does_not_overwrite_newer_state() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let successes = Arc::new(AtomicU32::new(0));
        let successes_clone = Arc::clone(&successes);

        // First fetch is slow and resolves after the second one.
        let executor = Arc::new(QueryExecutor::with_options(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(1)
                    } else {
                        Ok(2)
                    }
                }
            },
            QueryOptions::new().retry(false).on_success(move |_: &u32| {
                successes_clone.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        let slow = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.run(&deps(&["a"])).await })
        };
        tokio::task::yield_now().await;

        let fresh = executor.run(&deps(&["b"])).await;
        assert_eq!(fresh.data, Some(2));

        slow.await.expect("slow fetch task");
        assert_eq!(executor.state().await.data, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The discarded fetch must not fire the success callback either.
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_is_normalized() {
        let executor: QueryExecutor<u32> = QueryExecutor::with_options(
            || async { Err(DropshelfError::Auth("Invalid token".to_string())) },
            QueryOptions::new().retry(false),
        );

        let state = executor.run(&deps(&[])).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Authentication error: Your session has expired. Please sign in again.")
        );
    }
}
