//! Client configuration
//!
//! The backend base URL is selected by the current deployment mode:
//! development reads `DROPSHELF_DEV_SERVER_URL`, everything else reads
//! `DROPSHELF_SERVER_URL`. The mode itself comes from `DROPSHELF_ENV`.

use dropshelf_domain::{DropshelfError, Result};

/// Deployment mode the client is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Development,
    Production,
}

impl Deployment {
    /// Read the deployment mode from `DROPSHELF_ENV`.
    ///
    /// Anything other than `development` is treated as production.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("DROPSHELF_ENV").as_deref() {
            Ok("development") => Self::Development,
            _ => Self::Production,
        }
    }
}

/// Backend endpoint configuration for the API client and session manager.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend origin, without the `/v1` API prefix.
    pub base_url: String,
    pub deployment: Deployment,
}

impl ApiConfig {
    /// Create a configuration pointing at the given backend origin.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, deployment: Deployment::Production }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `DropshelfError::Config` if the URL variable selected by the
    /// deployment mode is missing.
    pub fn from_env() -> Result<Self> {
        let deployment = Deployment::from_env();
        let base_url = match deployment {
            Deployment::Development => env_var("DROPSHELF_DEV_SERVER_URL")?,
            Deployment::Production => env_var("DROPSHELF_SERVER_URL")?,
        };

        tracing::info!(?deployment, %base_url, "client configuration loaded from environment");

        Ok(Self { deployment, ..Self::new(base_url) })
    }

    /// Root of the versioned API: `{base_url}/v1`.
    #[must_use]
    pub fn api_root(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// URL of an unversioned auth endpoint, e.g. `/auth/signin`.
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of the token refresh endpoint.
    #[must_use]
    pub fn refresh_url(&self) -> String {
        format!("{}/v1/auth/refresh", self.base_url)
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| DropshelfError::Config(format!("Missing environment variable: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped() {
        let config = ApiConfig::new("http://localhost:6060/");
        assert_eq!(config.base_url, "http://localhost:6060");
        assert_eq!(config.api_root(), "http://localhost:6060/v1");
    }

    #[test]
    fn endpoint_urls_are_composed() {
        let config = ApiConfig::new("http://localhost:6060");
        assert_eq!(config.auth_url("/auth/signin"), "http://localhost:6060/auth/signin");
        assert_eq!(config.refresh_url(), "http://localhost:6060/v1/auth/refresh");
    }
}
