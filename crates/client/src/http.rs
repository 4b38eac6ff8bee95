//! Authenticated HTTP request pipeline
//!
//! Every API call flows through [`ApiClient::request`]: path-parameter
//! substitution, query string, bearer injection, and the single-shot 401
//! recovery. On a 401 the client asks the session manager to refresh and, if
//! that succeeds, replays the original request exactly once. A second 401 is
//! surfaced as an HTTP error rather than triggering another refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dropshelf_domain::{DropshelfError, ErrorBody, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::credentials::CredentialStore;
use crate::session::SessionManager;

/// General API request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request options: path parameters, query string, JSON body, and extra
/// headers.
#[derive(Debug, Default, Clone)]
pub struct RequestOptions {
    /// Values substituted for `:name` placeholders in the endpoint path.
    pub params: HashMap<String, String>,
    /// Query string key-value pairs.
    pub query: HashMap<String, String>,
    /// JSON request body.
    pub body: Option<serde_json::Value>,
    /// Additional request headers.
    pub headers: HashMap<String, String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Authenticated client over the versioned API.
pub struct ApiClient<S: CredentialStore> {
    session: Arc<SessionManager<S>>,
    http: reqwest::Client,
}

impl<S: CredentialStore> ApiClient<S> {
    /// Create a client sharing the given session manager.
    ///
    /// # Errors
    /// Returns `DropshelfError::Internal` if the HTTP client cannot be
    /// constructed.
    pub fn new(session: Arc<SessionManager<S>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DropshelfError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { session, http })
    }

    /// Issue a request against the versioned API.
    ///
    /// `endpoint` is a path relative to the API root and may contain `:name`
    /// placeholders resolved from `options.params`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let url = self.build_url(endpoint, options);

        let response = self.send(method.clone(), &url, options).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(%url, "received 401, attempting token refresh");
            if matches!(self.session.refresh().await, Ok(true)) {
                let retried = self.send(method, &url, options).await?;
                return Self::parse_response(retried).await;
            }
            return Err(DropshelfError::Auth("Authentication failed".to_string()));
        }

        Self::parse_response(response).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(Method::GET, endpoint, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(Method::POST, endpoint, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(Method::PUT, endpoint, options).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(Method::PATCH, endpoint, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(Method::DELETE, endpoint, options).await
    }

    /// The session manager backing this client.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager<S>> {
        &self.session
    }

    /// The underlying HTTP client, for requests that bypass the JSON
    /// pipeline (e.g. multipart uploads).
    #[must_use]
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn build_url(&self, endpoint: &str, options: &RequestOptions) -> String {
        let path = substitute_params(endpoint, &options.params);
        let mut url = format!("{}{}", self.session.config().api_root(), path);

        if !options.query.is_empty() {
            let mut pairs: Vec<(&String, &String)> = options.query.iter().collect();
            pairs.sort();
            let query: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }

        url
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.request(method, url);

        if let Some(token) = self.session.access_token().await? {
            request = request.bearer_auth(token);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                DropshelfError::Timeout(format!("Request to {url} timed out"))
            } else {
                DropshelfError::Network(e.to_string())
            }
        })
    }

    pub(crate) async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.reason().map(str::to_string))
                .unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                });
            return Err(DropshelfError::Http { status: status.as_u16(), message });
        }

        response
            .json()
            .await
            .map_err(|e| DropshelfError::Parse(format!("Invalid response body: {e}")))
    }
}

/// Replace `:name` placeholders with their values from `params`.
///
/// Unmatched placeholders are left untouched so the backend can reject them
/// visibly rather than silently hitting a different route.
fn substitute_params(endpoint: &str, params: &HashMap<String, String>) -> String {
    let mut path = endpoint.to_string();
    let mut entries: Vec<(&String, &String)> = params.iter().collect();
    // Longest names first so `:name_ext` is never clobbered by `:name`.
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (name, value) in entries {
        let placeholder = format!(":{name}");
        path = path.replace(&placeholder, &urlencoding::encode(value));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_path_params() {
        let mut params = HashMap::new();
        params.insert("name".to_string(), "report.pdf".to_string());
        assert_eq!(substitute_params("/files/:name", &params), "/files/report.pdf");
    }

    #[test]
    fn encodes_param_values() {
        let mut params = HashMap::new();
        params.insert("name".to_string(), "a b&c".to_string());
        assert_eq!(substitute_params("/files/:name", &params), "/files/a%20b%26c");
    }

    #[test]
    fn longer_placeholders_win() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "1".to_string());
        params.insert("id_ext".to_string(), "2".to_string());
        assert_eq!(substitute_params("/x/:id/:id_ext", &params), "/x/1/2");
    }

    #[test]
    fn unmatched_placeholders_survive() {
        let params = HashMap::new();
        assert_eq!(substitute_params("/files/:name", &params), "/files/:name");
    }
}
