//! # Dropshelf Client
//!
//! HTTP client pipeline for the Dropshelf backend:
//! - Session management with transparent token refresh
//! - Authenticated request client with single-shot 401 recovery
//! - Typed file endpoints including multipart upload
//! - Mutation and query executors with retries and staleness
//!
//! ## Architecture
//! - Depends on `dropshelf-domain` for wire types and errors
//! - Depends on `dropshelf-common` for the retry machinery
//! - All network I/O goes through `reqwest`

pub mod config;
pub mod credentials;
pub mod executor;
pub mod files;
pub mod http;
pub mod session;

pub use config::{ApiConfig, Deployment};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use executor::{
    MutationExecutor, MutationOptions, MutationState, QueryExecutor, QueryOptions, QueryState,
};
pub use files::FilesApi;
pub use http::{ApiClient, RequestOptions};
pub use session::SessionManager;
