//! # Dropshelf Proxy
//!
//! Reverse proxy that forwards browser traffic to the Dropshelf backend.
//! Requests to `/{path}` become `{backend}/api/{path}` with the body
//! preserved verbatim, hop-by-hop headers stripped in both directions, and a
//! hard deadline on every upstream call.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use dropshelf_domain::{DropshelfError, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Default upstream deadline.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Request headers never forwarded upstream. `accept-encoding` is stripped
/// so the upstream client negotiates compression itself and can decode what
/// it negotiated; forwarding the browser's value verbatim would disable that
/// decoding and ship compressed bytes through untouched.
const STRIP_REQUEST_HEADERS: &[&str] =
    &["host", "content-length", "connection", "upgrade", "accept-encoding"];

/// Response headers never forwarded back to the caller. The upstream client
/// decodes compressed bodies before they reach us, so the coding headers no
/// longer describe the bytes being forwarded.
const STRIP_RESPONSE_HEADERS: &[&str] = &["content-encoding", "transfer-encoding"];

/// Proxy configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Backend origin requests are forwarded to.
    pub backend_url: String,
    /// Address the proxy listens on.
    pub bind_addr: SocketAddr,
    /// Whether 500 responses carry the upstream error message. Off in
    /// production.
    pub expose_error_details: bool,
    /// Deadline applied to every upstream call.
    pub forward_timeout: Duration,
}

impl ProxyConfig {
    /// Load configuration from `DROPSHELF_BACKEND_URL`, `DROPSHELF_PROXY_ADDR`
    /// and `DROPSHELF_ENV`.
    ///
    /// # Errors
    /// Returns `DropshelfError::Config` when `DROPSHELF_PROXY_ADDR` is not a
    /// valid socket address.
    pub fn from_env() -> Result<Self> {
        let backend_url = std::env::var("DROPSHELF_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:6060".to_string());
        let addr = std::env::var("DROPSHELF_PROXY_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr: SocketAddr = addr
            .parse()
            .map_err(|_| DropshelfError::Config(format!("Invalid proxy address: {addr}")))?;
        let expose_error_details =
            std::env::var("DROPSHELF_ENV").as_deref() != Ok("production");

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            bind_addr,
            expose_error_details,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
        })
    }

    /// Configuration pointing at the given backend, listening on an
    /// ephemeral loopback port.
    ///
    /// # Errors
    /// Returns `DropshelfError::Config` if the loopback address fails to
    /// parse, which should not happen.
    pub fn for_backend(backend_url: impl Into<String>) -> Result<Self> {
        let bind_addr: SocketAddr = "127.0.0.1:0"
            .parse()
            .map_err(|_| DropshelfError::Config("Invalid loopback address".to_string()))?;
        let backend_url: String = backend_url.into();

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            bind_addr,
            expose_error_details: true,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
        })
    }

    /// Override the upstream deadline.
    #[must_use]
    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }
}

struct ProxyState {
    config: ProxyConfig,
    http: reqwest::Client,
}

/// Build the proxy router over the given configuration.
///
/// # Errors
/// Returns `DropshelfError::Internal` if the upstream HTTP client cannot be
/// constructed.
pub fn router(config: ProxyConfig) -> Result<Router> {
    // No client-level timeout: the deadline is enforced per request so a
    // config override applies uniformly.
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| DropshelfError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let state = Arc::new(ProxyState { config, http });

    Ok(Router::new()
        .route("/{*path}", get(forward).post(forward).put(forward).delete(forward))
        .with_state(state))
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut url = format!("{}/api/{}", state.config.backend_url, path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }

    debug!(%method, %url, "forwarding request");

    let mut upstream_headers = HeaderMap::new();
    for (name, value) in &headers {
        if !STRIP_REQUEST_HEADERS.contains(&name.as_str()) {
            upstream_headers.append(name.clone(), value.clone());
        }
    }

    let request = state
        .http
        .request(method, &url)
        .headers(upstream_headers)
        .body(body.to_vec());

    let response = match tokio::time::timeout(state.config.forward_timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(error = %e, %url, "upstream request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &state.config, &e.to_string());
        }
        Err(_) => {
            warn!(%url, "upstream request timed out");
            return (
                StatusCode::GATEWAY_TIMEOUT,
                axum::Json(serde_json::json!({"error": "Request timeout"})),
            )
                .into_response();
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response_headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if !STRIP_RESPONSE_HEADERS.contains(&name.as_str()) {
            response_headers.append(name.clone(), value.clone());
        }
    }

    let body = match tokio::time::timeout(state.config.forward_timeout, response.bytes()).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            error!(error = %e, %url, "failed to read upstream body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &state.config, &e.to_string());
        }
        Err(_) => {
            warn!(%url, "upstream body read timed out");
            return (
                StatusCode::GATEWAY_TIMEOUT,
                axum::Json(serde_json::json!({"error": "Request timeout"})),
            )
                .into_response();
        }
    };

    (status, response_headers, body).into_response()
}

fn error_response(status: StatusCode, config: &ProxyConfig, details: &str) -> Response {
    let body = if config.expose_error_details {
        serde_json::json!({"error": "Proxy error", "details": details})
    } else {
        serde_json::json!({"error": "Proxy error"})
    };
    (status, axum::Json(body)).into_response()
}

/// Running proxy server with graceful shutdown.
pub struct ProxyServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProxyServer {
    /// Bind and start serving.
    ///
    /// # Errors
    /// Returns `DropshelfError::Network` if the listener cannot be bound.
    pub async fn start(config: ProxyConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| DropshelfError::Network(format!("Failed to bind proxy listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| DropshelfError::Network(format!("Failed to determine address: {e}")))?;

        let app = router(config)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "proxy server error");
            }
        });

        tracing::info!(%addr, "proxy listening");

        Ok(Self { addr, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// The bound listen address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the running proxy.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shut down gracefully and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(DropshelfError::Internal(format!("Proxy server panicked: {err}")));
                }
            }
        }
        Ok(())
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}
