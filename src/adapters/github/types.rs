//! GitHub REST API Response Types
//!
//! Serde shapes for the four endpoints the client reads, plus their
//! conversions into domain types. Missing fields default the way the API
//! documents them: counts to zero, day lists to empty.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{DailyCount, Release, RepoStats, TrafficData};

/// One day entry of `/traffic/views` or `/traffic/clones`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficDay {
  /// Start of the day bucket (ISO-8601, UTC midnight).
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub uniques: u64,
}

/// Response of `GET /repos/{owner}/{repo}/traffic/views`.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewsResponse {
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub uniques: u64,
  #[serde(default)]
  pub views: Vec<TrafficDay>,
}

/// Response of `GET /repos/{owner}/{repo}/traffic/clones`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClonesResponse {
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub uniques: u64,
  #[serde(default)]
  pub clones: Vec<TrafficDay>,
}

/// Subset of `GET /repos/{owner}/{repo}` the collector needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoResponse {
  #[serde(default)]
  pub forks_count: u64,
  #[serde(default)]
  pub stargazers_count: u64,
  #[serde(default)]
  pub watchers_count: u64,
  #[serde(default)]
  pub open_issues_count: u64,
}

/// One entry of `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseResponse {
  #[serde(default)]
  pub tag_name: String,
  /// Absent for drafts and releases that were never published.
  pub published_at: Option<DateTime<Utc>>,
  pub name: Option<String>,
}

fn to_daily(days: Vec<TrafficDay>) -> Vec<DailyCount> {
  days
    .into_iter()
    .map(|d| DailyCount {
      date: d.timestamp.date_naive(),
      count: d.count,
      uniques: d.uniques,
    })
    .collect()
}

impl From<ViewsResponse> for TrafficData {
  fn from(r: ViewsResponse) -> Self {
    Self {
      count: r.count,
      uniques: r.uniques,
      items: to_daily(r.views),
    }
  }
}

impl From<ClonesResponse> for TrafficData {
  fn from(r: ClonesResponse) -> Self {
    Self {
      count: r.count,
      uniques: r.uniques,
      items: to_daily(r.clones),
    }
  }
}

impl From<RepoResponse> for RepoStats {
  fn from(r: RepoResponse) -> Self {
    Self {
      forks_count: r.forks_count,
      stargazers_count: r.stargazers_count,
      watchers_count: r.watchers_count,
      open_issues_count: r.open_issues_count,
    }
  }
}

impl ReleaseResponse {
  /// Domain release marker, or `None` when the release is unpublished.
  pub fn into_release(self) -> Option<Release> {
    let published = self.published_at?;
    Some(Release {
      tag_name: self.tag_name,
      published_at: published.date_naive(),
      name: self.name.unwrap_or_default(),
    })
  }
}
