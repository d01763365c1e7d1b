//! Report Use Case - Per-Repository Totals
//!
//! Reduces a traffic frame to one summary row per repository for the
//! `show` command. Absent view/clone values count as zero; stars and
//! forks are point-in-time snapshots, so the most recent known value wins.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::adapters::storage::TrafficFrame;

/// Aggregated traffic for one repository over a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
  pub repo_owner: String,
  pub repo_name: String,
  /// Days with a row in the frame.
  pub days: usize,
  pub first_date: NaiveDate,
  pub last_date: NaiveDate,
  pub views_total: u64,
  pub views_unique: u64,
  pub clones_total: u64,
  pub clones_unique: u64,
  /// Stars on the latest day that has a value.
  pub stars: Option<u64>,
  /// Forks on the latest day that has a value.
  pub forks: Option<u64>,
}

impl RepoSummary {
  fn start(owner: &str, name: &str, date: NaiveDate) -> Self {
    Self {
      repo_owner: owner.to_string(),
      repo_name: name.to_string(),
      days: 0,
      first_date: date,
      last_date: date,
      views_total: 0,
      views_unique: 0,
      clones_total: 0,
      clones_unique: 0,
      stars: None,
      forks: None,
    }
  }
}

/// One summary per repository, sorted by (name, owner).
pub fn summarize(frame: &TrafficFrame) -> Vec<RepoSummary> {
  let mut by_repo: BTreeMap<(&str, &str), (RepoSummary, Option<NaiveDate>, Option<NaiveDate>)> =
    BTreeMap::new();

  for row in frame {
    let (summary, stars_at, forks_at) = by_repo
      .entry((row.repo_name.as_str(), row.repo_owner.as_str()))
      .or_insert_with(|| {
        (
          RepoSummary::start(&row.repo_owner, &row.repo_name, row.record_date),
          None,
          None,
        )
      });

    summary.days += 1;
    summary.first_date = summary.first_date.min(row.record_date);
    summary.last_date = summary.last_date.max(row.record_date);
    summary.views_total += row.views_total.unwrap_or(0);
    summary.views_unique += row.views_unique.unwrap_or(0);
    summary.clones_total += row.clones_total.unwrap_or(0);
    summary.clones_unique += row.clones_unique.unwrap_or(0);

    if row.stars_count.is_some() && stars_at.is_none_or(|d| row.record_date >= d) {
      summary.stars = row.stars_count;
      *stars_at = Some(row.record_date);
    }
    if row.forks_count.is_some() && forks_at.is_none_or(|d| row.record_date >= d) {
      summary.forks = row.forks_count;
      *forks_at = Some(row.record_date);
    }
  }

  by_repo.into_values().map(|(summary, _, _)| summary).collect()
}
