//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-facing notice surfaced when a terminal failure turns out to be an
/// authentication problem.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Main error type for Dropshelf
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DropshelfError {
    /// Transport-level failure: the request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response with the message extracted from the body when
    /// possible.
    #[error("HTTP error: {status}: {message}")]
    Http { status: u16, message: String },

    /// Authentication failed and could not be recovered by a token refresh.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Deadline exceeded (proxy-only).
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DropshelfError {
    /// Whether this error represents an authentication failure.
    ///
    /// Matches the `Auth` variant as well as messages the backend (or an
    /// intermediate layer) phrases as auth failures. The mutation and query
    /// executors use this to normalize terminal errors into
    /// [`SESSION_EXPIRED_MESSAGE`].
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        if matches!(self, Self::Auth(_)) {
            return true;
        }
        let message = self.to_string();
        ["Authentication failed", "Session expired", "Invalid token"]
            .iter()
            .any(|needle| message.contains(needle))
    }

    /// Stable label suitable for structured logging.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Auth(_) => "auth",
            Self::Parse(_) => "parse",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// The normalized user-facing session-expiry notice.
#[must_use]
pub fn session_expired_message() -> &'static str {
    SESSION_EXPIRED_MESSAGE
}

/// Result type alias for Dropshelf operations
pub type Result<T> = std::result::Result<T, DropshelfError>;
