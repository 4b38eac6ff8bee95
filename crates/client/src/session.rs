//! Session lifecycle: sign-up, sign-in, refresh, sign-out
//!
//! The session manager owns the auth endpoints and is the only writer of the
//! credential store. Refresh is deliberately infallible from the caller's
//! point of view: it answers "is the session still usable?" with a bool and
//! clears the credential on any failure, so callers never have to
//! distinguish refresh errors from plain sign-out.

use std::sync::Arc;
use std::time::Duration;

use dropshelf_domain::{
    AuthResponse, Credential, DropshelfError, ErrorBody, RefreshRequest, RefreshResponse, Result,
    SigninRequest, SignupRequest, User,
};
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::credentials::CredentialStore;

/// Auth request timeout. Matches the general API deadline so a hung refresh
/// cannot stall a retried request indefinitely.
const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates authentication against the backend and owns credential
/// mutation.
pub struct SessionManager<S: CredentialStore> {
    config: ApiConfig,
    store: S,
    http: reqwest::Client,
    /// Serializes refresh attempts so concurrent 401s trigger one network
    /// round-trip, not a stampede.
    refresh_lock: Arc<Mutex<()>>,
}

impl<S: CredentialStore> SessionManager<S> {
    /// Create a session manager over the given configuration and credential
    /// store.
    ///
    /// # Errors
    /// Returns `DropshelfError::Internal` if the HTTP client cannot be
    /// constructed.
    pub fn new(config: ApiConfig, store: S) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(AUTH_TIMEOUT)
            .build()
            .map_err(|e| DropshelfError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, store, http, refresh_lock: Arc::new(Mutex::new(())) })
    }

    /// Register a new account and establish a session.
    pub async fn sign_up(&self, request: &SignupRequest) -> Result<User> {
        self.authenticate("/auth/signup", request).await
    }

    /// Sign in with username and password.
    ///
    /// On failure the stored credential is cleared: a rejected sign-in must
    /// never leave a previous session half-alive.
    pub async fn sign_in(&self, request: &SigninRequest) -> Result<User> {
        let result = self.authenticate("/auth/signin", request).await;
        if result.is_err() {
            self.store.clear().await?;
        }
        result
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `Ok(true)` when a new credential was stored, `Ok(false)` when
    /// the session is gone: no refresh token on hand, or the backend rejected
    /// the exchange. In the `false` case the credential store is cleared.
    /// Without a refresh token no network request is made.
    pub async fn refresh(&self) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.store.load().await? else {
            return Ok(false);
        };
        let Some(refresh_token) = current.refresh_token.clone() else {
            tracing::debug!("no refresh token available, clearing session");
            self.store.clear().await?;
            return Ok(false);
        };

        let response = self
            .http
            .post(self.config.refresh_url())
            .json(&RefreshRequest { refresh_token: refresh_token.clone() })
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "token refresh rejected, clearing session");
                self.store.clear().await?;
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, clearing session");
                self.store.clear().await?;
                return Ok(false);
            }
        };

        let refreshed: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh response unreadable, clearing session");
                self.store.clear().await?;
                return Ok(false);
            }
        };

        // Rotation is optional server-side: keep the old refresh token when
        // the response omits a replacement.
        let refresh_token = refreshed.refresh_token.or(Some(refresh_token));
        let credential = Credential::new(
            refreshed.access_token,
            refresh_token,
            refreshed.expires_in.unwrap_or(0),
        );
        self.store.store(credential).await?;

        tracing::debug!("access token refreshed");
        Ok(true)
    }

    /// Drop the session. Idempotent; signing out twice is a no-op.
    pub async fn sign_out(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Whether a credential is currently stored.
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.store.load().await?.is_some())
    }

    /// The current access token, if a session exists.
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.store.load().await?.map(|c| c.access_token))
    }

    /// The full current credential, if a session exists.
    pub async fn credential(&self) -> Result<Option<Credential>> {
        self.store.load().await
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn authenticate<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<User> {
        let url = self.config.auth_url(path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DropshelfError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.reason().map(str::to_string))
                .unwrap_or_else(|| format!("Authentication failed with status {}", status.as_u16()));
            return Err(DropshelfError::Auth(message));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| DropshelfError::Parse(format!("Invalid auth response: {e}")))?;

        self.store.store(auth.credential()).await?;
        tracing::info!(username = %auth.user.username, "session established");
        Ok(auth.user)
    }
}
