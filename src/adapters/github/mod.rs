//! GitHub REST API Adapter
//!
//! Implements the `TrafficSource` port over the GitHub REST API.
//!
//! Sub-modules:
//! - `client`: client/session lifetime, retries, status classification
//! - `error`: the API error family
//! - `types`: response payloads and their domain conversions

pub mod client;
pub mod error;
pub mod types;

pub use client::{GitHubClient, GitHubClientConfig, GitHubSession};
pub use error::GitHubError;
