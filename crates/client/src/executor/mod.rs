//! Mutation and query executors
//!
//! Two consumption layers over the API client:
//! - [`MutationExecutor`] runs write operations with bounded exponential
//!   backoff and tracked state.
//! - [`QueryExecutor`] runs read operations with dependency tracking and a
//!   staleness window so repeated renders of the same inputs do not refetch.

pub mod mutation;
pub mod query;

pub use mutation::{MutationExecutor, MutationOptions, MutationState};
pub use query::{QueryExecutor, QueryOptions, QueryState};
