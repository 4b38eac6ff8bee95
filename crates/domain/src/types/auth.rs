//! Credential and authentication wire types
//!
//! The [`Credential`] is the single cross-cutting mutable resource of the
//! client pipeline: read by every request, written only by sign-in, sign-up,
//! refresh, and sign-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::user::User;

/// Access and refresh tokens with expiry metadata.
///
/// Invariant: a stored credential always carries a non-empty access token;
/// "authenticated" is defined as "a credential is present".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived token authorizing API calls.
    pub access_token: String,

    /// Longer-lived token used to obtain a new access token.
    /// Optional because sign-up responses may omit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp (UTC), calculated from `expires_in`
    /// at credential creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a new credential with a calculated expiration time.
    ///
    /// `expires_in` is the access-token lifetime in seconds; zero or
    /// negative means "no known expiry".
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self { access_token, refresh_token, expires_at }
    }

    /// Check if the access token is expired or will expire within the given
    /// threshold.
    ///
    /// Returns `false` when no expiry is known.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let threshold = chrono::Duration::seconds(threshold_seconds);
                Utc::now() + threshold >= expires_at
            }
            None => false,
        }
    }
}

/// Sign-up request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Sign-in request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// Response shape of `POST /auth/signin` and `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl AuthResponse {
    /// Build the credential this response establishes.
    #[must_use]
    pub fn credential(&self) -> Credential {
        Credential::new(
            self.access_token.clone(),
            self.refresh_token.clone(),
            self.expires_in.unwrap_or(0),
        )
    }
}

/// Request body of `POST /v1/auth/refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response shape of `POST /v1/auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    //! Unit tests for credential lifetime arithmetic.
    use super::*;

    #[test]
    fn credential_creation_sets_expiry() {
        let cred = Credential::new("tok".to_string(), Some("rtok".to_string()), 3600);
        assert_eq!(cred.access_token, "tok");
        assert_eq!(cred.refresh_token.as_deref(), Some("rtok"));
        assert!(cred.expires_at.is_some());
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let cred = Credential::new("tok".to_string(), None, 0);
        assert!(cred.expires_at.is_none());
        assert!(!cred.is_expired(300));
    }

    #[test]
    fn expiry_check_honors_threshold() {
        let cred = Credential::new("tok".to_string(), None, 3600);
        // Not expired with a 5-minute threshold.
        assert!(!cred.is_expired(300));
        // Expired if the threshold exceeds the remaining lifetime.
        assert!(cred.is_expired(7200));
    }

    #[test]
    fn auth_response_builds_credential() {
        let json = serde_json::json!({
            "user": {"id": "1", "username": "alice"},
            "access_token": "tok",
            "refresh_token": "rtok",
            "expires_in": 3600
        });
        let response: AuthResponse =
            serde_json::from_value(json).expect("auth response should parse");

        let cred = response.credential();
        assert_eq!(cred.access_token, "tok");
        assert_eq!(cred.refresh_token.as_deref(), Some("rtok"));
        assert!(cred.expires_at.is_some());
    }

    #[test]
    fn auth_response_tolerates_missing_optional_fields() {
        let json = serde_json::json!({
            "user": {"id": "1", "username": "alice"},
            "access_token": "tok"
        });
        let response: AuthResponse =
            serde_json::from_value(json).expect("auth response should parse");

        let cred = response.credential();
        assert!(cred.refresh_token.is_none());
        assert!(cred.expires_at.is_none());
    }
}
