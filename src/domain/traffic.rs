//! Core traffic domain types.
//!
//! Defines the persisted daily record, its composite natural key, and the
//! transient API-response shapes handed from the GitHub client to the
//! record builder. Release markers live here too since reporting consumes
//! them alongside stored records.

use chrono::{DateTime, NaiveDate, Utc};

// ────────────────────────────────────────────
// Persisted record
// ────────────────────────────────────────────

/// Composite natural key of a stored row: (date, owner, name).
///
/// At most one [`TrafficRecord`] per key exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrafficKey {
    pub record_date: NaiveDate,
    pub repo_owner: String,
    pub repo_name: String,
}

/// Single day's traffic for one repository.
///
/// Metric fields are `None` when the API returned nothing for that metric
/// on that day, which is distinct from `Some(0)`. Fork and star counts are
/// point-in-time snapshots taken at collection time, not deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    /// Calendar day the traffic belongs to (UTC).
    pub record_date: NaiveDate,
    /// Organization or user owning the repository.
    pub repo_owner: String,
    /// Repository name.
    pub repo_name: String,
    /// Total clones that day.
    pub clones_total: Option<u64>,
    /// Unique cloners that day.
    pub clones_unique: Option<u64>,
    /// Total page views that day.
    pub views_total: Option<u64>,
    /// Unique visitors that day.
    pub views_unique: Option<u64>,
    /// Fork count snapshot at collection time.
    pub forks_count: Option<u64>,
    /// Star count snapshot at collection time.
    pub stars_count: Option<u64>,
    /// When the record was produced. Provenance only, not part of the key.
    pub collected_at: DateTime<Utc>,
}

impl TrafficRecord {
    /// Empty record for a key; every metric starts absent.
    pub fn new(
        record_date: NaiveDate,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_date,
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            clones_total: None,
            clones_unique: None,
            views_total: None,
            views_unique: None,
            forks_count: None,
            stars_count: None,
            collected_at,
        }
    }

    /// Owned copy of this record's natural key.
    pub fn key(&self) -> TrafficKey {
        TrafficKey {
            record_date: self.record_date,
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
        }
    }

    /// Ordering used for every persisted or queried dataset:
    /// ascending by (owner, name, date).
    pub fn sort_key(&self) -> (&str, &str, NaiveDate) {
        (&self.repo_owner, &self.repo_name, self.record_date)
    }
}

// ────────────────────────────────────────────
// Transient API shapes
// ────────────────────────────────────────────

/// One day of view or clone traffic as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCount {
    /// UTC calendar day.
    pub date: NaiveDate,
    /// Total events that day.
    pub count: u64,
    /// Unique actors that day.
    pub uniques: u64,
}

/// Traffic for the trailing window the API exposes (about 14 days).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficData {
    /// Total over the whole window.
    pub count: u64,
    /// Unique actors over the whole window.
    pub uniques: u64,
    /// Per-day breakdown, in the order the API returned it.
    pub items: Vec<DailyCount>,
}

/// Point-in-time repository counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStats {
    pub forks_count: u64,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub open_issues_count: u64,
}

/// A published release, used as an annotation marker in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version tag (e.g. `v1.0.0`).
    pub tag_name: String,
    /// UTC calendar day the release was published.
    pub published_at: NaiveDate,
    /// Release title, empty when the release has none.
    pub name: String,
}
