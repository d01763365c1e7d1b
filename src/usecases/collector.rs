//! Collector Use Case - Fetch, Merge, and Upsert Traffic
//!
//! Drives one collection run over the configured repositories.
//!
//! Per repository:
//! 1. Fetch views, clones, and repo stats concurrently (joint await)
//! 2. Merge them into per-day records sharing one stats snapshot
//! 3. Hand the records back; any fetch error yields zero records
//!
//! Across repositories the run is sequential unless `concurrency` is
//! raised. All records are upserted into the store in one call at the end.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use crate::adapters::github::GitHubError;
use crate::adapters::metrics::CollectorMetrics;
use crate::adapters::storage::StatsStore;
use crate::config::RepoConfig;
use crate::domain::{TrafficRecord, build_records};
use crate::ports::TrafficSource;

/// Options for a collection run.
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
  /// Repositories collected at once (minimum 1).
  pub concurrency: usize,
  /// List what would be collected without any request or write.
  pub dry_run: bool,
}

impl Default for CollectOptions {
  fn default() -> Self {
    Self {
      concurrency: 1,
      dry_run: false,
    }
  }
}

/// Outcome of a collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
  /// Repositories attempted.
  pub repos_total: usize,
  /// Repositories whose fetch failed and produced no records.
  pub repos_failed: usize,
  /// Records submitted to the store.
  pub records_stored: usize,
}

/// Collect one repository, failing on the first fetch error.
///
/// The three requests run concurrently and are awaited together; if any
/// fails the whole repository fails and nothing partial is returned.
pub async fn try_collect_repo(
  source: &dyn TrafficSource,
  repo: &RepoConfig,
  collected_at: DateTime<Utc>,
) -> Result<Vec<TrafficRecord>, GitHubError> {
  let (views, clones, stats) = tokio::try_join!(
    source.get_views(&repo.owner, &repo.name),
    source.get_clones(&repo.owner, &repo.name),
    source.get_repo_stats(&repo.owner, &repo.name),
  )?;

  Ok(build_records(
    &repo.owner,
    &repo.name,
    &views,
    &clones,
    stats,
    collected_at,
  ))
}

/// Collect one repository. Errors are logged and produce an empty batch.
pub async fn collect_repo(
  source: &dyn TrafficSource,
  repo: &RepoConfig,
  collected_at: DateTime<Utc>,
) -> Vec<TrafficRecord> {
  collect_or_log(source, repo, collected_at)
    .await
    .unwrap_or_default()
}

/// `None` marks a failed repository; the failure is already logged.
#[instrument(skip(source, repo), fields(repo = %repo.full_name()))]
async fn collect_or_log(
  source: &dyn TrafficSource,
  repo: &RepoConfig,
  collected_at: DateTime<Utc>,
) -> Option<Vec<TrafficRecord>> {
  match try_collect_repo(source, repo, collected_at).await {
    Ok(records) => {
      info!(records = records.len(), "Repository collected");
      Some(records)
    }
    Err(e) => {
      log_failure(repo, &e);
      None
    }
  }
}

fn log_failure(repo: &RepoConfig, e: &GitHubError) {
  match e {
    GitHubError::RateLimited { reset_at } => warn!(
      repo = %repo.full_name(),
      reset_at = ?reset_at,
      "Rate limited, repository skipped"
    ),
    GitHubError::NotFound { .. } => warn!(
      repo = %repo.full_name(),
      error = %e,
      "Repository not found or no traffic access"
    ),
    _ => error!(repo = %repo.full_name(), error = %e, "Repository collection failed"),
  }
}

/// Collect every repository and upsert the combined batch.
///
/// One repository's failure never aborts the run. The store is written
/// once, and only when at least one record was collected.
///
/// # Errors
/// Only store failures are returned; fetch failures are counted in
/// [`CollectSummary::repos_failed`].
#[instrument(skip_all, fields(repos = repos.len(), dry_run = options.dry_run))]
pub async fn collect_all(
  source: &dyn TrafficSource,
  repos: &[RepoConfig],
  store: &StatsStore,
  options: CollectOptions,
  metrics: Option<&CollectorMetrics>,
) -> Result<CollectSummary> {
  let mut summary = CollectSummary {
    repos_total: repos.len(),
    ..CollectSummary::default()
  };

  if options.dry_run {
    for repo in repos {
      info!(repo = %repo.full_name(), "Dry run: would collect");
    }
    return Ok(summary);
  }

  let collected_at = Utc::now();
  let results: Vec<Option<Vec<TrafficRecord>>> = stream::iter(repos)
    .map(|repo| collect_or_log(source, repo, collected_at))
    .buffer_unordered(options.concurrency.max(1))
    .collect()
    .await;

  let mut records = Vec::new();
  for result in results {
    let outcome = if let Some(batch) = result {
      records.extend(batch);
      "ok"
    } else {
      summary.repos_failed += 1;
      "failed"
    };
    if let Some(m) = metrics {
      m.repo_collections.with_label_values(&[outcome]).inc();
    }
  }

  if records.is_empty() {
    warn!("No records collected, store left untouched");
    return Ok(summary);
  }

  let outcome = store
    .upsert_counted(records)
    .with_context(|| format!("Failed to upsert into {}", store.path().display()))?;
  summary.records_stored = outcome.submitted;

  if let Some(m) = metrics {
    m.records_upserted
      .inc_by(u64::try_from(outcome.submitted).unwrap_or(u64::MAX));
    m.store_rows
      .set(i64::try_from(outcome.total_rows).unwrap_or(i64::MAX));
  }

  info!(
    repos_total = summary.repos_total,
    repos_failed = summary.repos_failed,
    records_stored = summary.records_stored,
    "Collection run finished"
  );
  Ok(summary)
}
