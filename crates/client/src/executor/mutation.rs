//! Retrying mutation executor
//!
//! Wraps a write operation with bounded exponential backoff and an
//! observable state snapshot. The retry loop lives in `dropshelf-common`;
//! this layer adds state tracking, callbacks, and the normalization of
//! terminal auth failures into the user-facing session-expiry notice.

use std::sync::Arc;

use dropshelf_common::{retry, RetryConfig};
use dropshelf_domain::{session_expired_message, DropshelfError, Result};
use futures::future::BoxFuture;
use tokio::sync::RwLock;

/// Observable state of a mutation executor.
///
/// `retry_count` stays 0 while retries are in flight and reports the
/// retries performed only when the operation fails terminally; a success
/// resets it to 0 regardless of how many attempts it took.
#[derive(Debug, Clone)]
pub struct MutationState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub success: bool,
    pub retry_count: u32,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self { data: None, loading: false, error: None, success: false, retry_count: 0 }
    }
}

type SuccessCallback<V, T> = Arc<dyn Fn(&T, &V) + Send + Sync>;
type ErrorCallback<V> = Arc<dyn Fn(&DropshelfError, &V) + Send + Sync>;

/// Configuration for a mutation executor. Callbacks receive the operation's
/// input alongside the result so a single callback can serve several call
/// sites.
#[derive(Clone)]
pub struct MutationOptions<V, T> {
    pub retry: RetryConfig,
    pub on_success: Option<SuccessCallback<V, T>>,
    pub on_error: Option<ErrorCallback<V>>,
}

impl<V, T> Default for MutationOptions<V, T> {
    fn default() -> Self {
        Self { retry: RetryConfig::default(), on_success: None, on_error: None }
    }
}

impl<V, T> MutationOptions<V, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl Fn(&T, &V) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_error(
        mut self,
        callback: impl Fn(&DropshelfError, &V) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

type MutationOp<V, T> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Executes a write operation with retries and tracks its state.
pub struct MutationExecutor<V, T> {
    operation: MutationOp<V, T>,
    options: MutationOptions<V, T>,
    state: RwLock<MutationState<T>>,
}

impl<V, T> MutationExecutor<V, T>
where
    V: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create an executor over the given operation with default options.
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_options(operation, MutationOptions::default())
    }

    /// Create an executor with explicit options.
    pub fn with_options<F, Fut>(operation: F, options: MutationOptions<V, T>) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let operation: MutationOp<V, T> =
            Arc::new(move |vars| Box::pin(operation(vars)) as BoxFuture<'static, Result<T>>);
        Self { operation, options, state: RwLock::new(MutationState::default()) }
    }

    /// Run the mutation with the given variables.
    ///
    /// Failed attempts are retried with exponential backoff up to the
    /// configured maximum. A terminal auth failure is rephrased as the
    /// session-expiry notice so the caller can surface it directly.
    pub async fn mutate(&self, variables: V) -> Result<T> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
            state.success = false;
            state.retry_count = 0;
        }

        let operation = Arc::clone(&self.operation);
        let outcome = retry(self.options.retry.clone(), || {
            let operation = Arc::clone(&operation);
            let vars = variables.clone();
            async move { operation(vars).await }
        })
        .await;

        match outcome.result {
            Ok(value) => {
                {
                    let mut state = self.state.write().await;
                    state.data = Some(value.clone());
                    state.loading = false;
                    state.success = true;
                    state.retry_count = 0;
                }
                if let Some(callback) = &self.options.on_success {
                    callback(&value, &variables);
                }
                Ok(value)
            }
            Err(error) => {
                let error = normalize_auth_error(error);
                {
                    let mut state = self.state.write().await;
                    state.loading = false;
                    state.error = Some(error.to_string());
                    state.retry_count = outcome.retries;
                }
                if let Some(callback) = &self.options.on_error {
                    callback(&error, &variables);
                }
                Err(error)
            }
        }
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> MutationState<T> {
        self.state.read().await.clone()
    }

    /// Reset to the idle state.
    pub async fn reset(&self) {
        *self.state.write().await = MutationState::default();
    }
}

/// Rephrase terminal auth failures as the user-facing session-expiry notice.
fn normalize_auth_error(error: DropshelfError) -> DropshelfError {
    if error.is_auth_failure() {
        DropshelfError::Auth(session_expired_message().to_string())
    } else {
        error
    }
}
