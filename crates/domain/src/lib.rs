//! # Dropshelf Domain
//!
//! Shared domain types for the Dropshelf client pipeline.
//!
//! This crate contains:
//! - Credential and auth wire types
//! - User and file models matching the backend JSON contracts
//! - The error enum and Result alias used across all crates
//!
//! ## Architecture
//! - No dependencies on other Dropshelf crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{session_expired_message, DropshelfError, Result};
pub use types::auth::{
    AuthResponse, Credential, RefreshRequest, RefreshResponse, SigninRequest, SignupRequest,
};
pub use types::files::{FileDownload, StoredFile};
pub use types::user::User;
pub use types::ErrorBody;
