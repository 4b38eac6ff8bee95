//! Domain types and wire models
//!
//! Shapes mirror the backend's JSON contracts exactly; anything the server
//! may omit is an `Option`.

pub mod auth;
pub mod files;
pub mod user;

use serde::{Deserialize, Serialize};

/// Error body shape the backend (and intermediaries) may attach to non-2xx
/// responses. Servers emit either `message` or `error`; both are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best-effort failure reason: `message` wins over `error`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_prefers_message_over_error() {
        let body = ErrorBody {
            message: Some("bad input".to_string()),
            error: Some("invalid".to_string()),
        };
        assert_eq!(body.reason(), Some("bad input"));

        let body = ErrorBody { message: None, error: Some("invalid".to_string()) };
        assert_eq!(body.reason(), Some("invalid"));

        assert_eq!(ErrorBody::default().reason(), None);
    }
}
