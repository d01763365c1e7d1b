//! Traffic Source Port - Read Access to Repository Traffic
//!
//! The collection use cases only see this trait; the GitHub session
//! adapter implements it over HTTP and tests substitute mocks.

use async_trait::async_trait;

use crate::adapters::github::GitHubError;
use crate::domain::{Release, RepoStats, TrafficData};

/// Upper bound the releases endpoint accepts for `per_page`.
pub const MAX_RELEASES_PAGE: u8 = 100;

/// Read-only source of traffic, repository counters, and releases.
///
/// Implementations never swallow errors; classification happens inside
/// the implementation and callers decide what a failure means.
#[async_trait]
pub trait TrafficSource: Send + Sync {
  /// Page views for the trailing window the API exposes.
  async fn get_views(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError>;

  /// Clone traffic for the trailing window the API exposes.
  async fn get_clones(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError>;

  /// Current fork/star/watcher/open-issue counts.
  async fn get_repo_stats(&self, owner: &str, name: &str) -> Result<RepoStats, GitHubError>;

  /// Published releases, unordered. `per_page` is clamped to
  /// [`MAX_RELEASES_PAGE`].
  async fn get_releases(
    &self,
    owner: &str,
    name: &str,
    per_page: u8,
  ) -> Result<Vec<Release>, GitHubError>;
}
