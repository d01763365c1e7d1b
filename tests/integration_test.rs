//! Integration Tests - Collection Runs against a Mocked Traffic Source
//!
//! Tests the interaction between use cases, the `TrafficSource` port, and
//! the Parquet store. Uses mockall for the port and tokio::test for async.

use chrono::{NaiveDate, TimeZone, Utc};
use mockall::mock;
use mockall::predicate::*;
use tempfile::tempdir;

use ghstats::adapters::github::GitHubError;
use ghstats::adapters::metrics::CollectorMetrics;
use ghstats::adapters::storage::{StatsFilter, StatsStore};
use ghstats::config::RepoConfig;
use ghstats::domain::{DailyCount, Release, RepoStats, TrafficData};
use ghstats::ports::TrafficSource;
use ghstats::usecases::{CollectOptions, collect_all, collect_repo, fetch_releases};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl TrafficSource for Source {
        async fn get_views(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError>;
        async fn get_clones(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError>;
        async fn get_repo_stats(&self, owner: &str, name: &str) -> Result<RepoStats, GitHubError>;
        async fn get_releases(
            &self,
            owner: &str,
            name: &str,
            per_page: u8,
        ) -> Result<Vec<Release>, GitHubError>;
    }
}

// ---- Fixtures ----

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn traffic(days: &[(u32, u64, u64)]) -> TrafficData {
    TrafficData {
        count: days.iter().map(|(_, c, _)| c).sum(),
        uniques: days.iter().map(|(_, _, u)| u).sum(),
        items: days
            .iter()
            .map(|&(d, count, uniques)| DailyCount {
                date: date(d),
                count,
                uniques,
            })
            .collect(),
    }
}

fn stats(stars: u64) -> RepoStats {
    RepoStats {
        forks_count: 25,
        stargazers_count: stars,
        watchers_count: stars,
        open_issues_count: 3,
    }
}

fn repo(name: &str) -> RepoConfig {
    RepoConfig::new("NatLabRockies", name)
}

/// Source where `floris` has two view days and two clone days (one shared)
/// and every other repository is missing.
fn floris_source() -> MockSource {
    let mut source = MockSource::new();
    source.expect_get_views().returning(|_, name| match name {
        "floris" => Ok(traffic(&[(1, 10, 3), (2, 15, 5)])),
        other => Err(GitHubError::NotFound {
            path: format!("/repos/NatLabRockies/{other}/traffic/views"),
        }),
    });
    source
        .expect_get_clones()
        .returning(|_, _| Ok(traffic(&[(2, 5, 2), (3, 8, 4)])));
    source
        .expect_get_repo_stats()
        .returning(|_, _| Ok(stats(150)));
    source
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_collect_repo_merges_views_and_clones_per_day() {
    let source = floris_source();
    let collected_at = Utc.with_ymd_and_hms(2024, 1, 4, 6, 0, 0).unwrap();

    let mut records = collect_repo(&source, &repo("floris"), collected_at).await;
    records.sort_by_key(|r| r.record_date);

    assert_eq!(records.len(), 3);

    assert_eq!(records[0].record_date, date(1));
    assert_eq!(records[0].views_total, Some(10));
    assert_eq!(records[0].clones_total, None);

    assert_eq!(records[1].record_date, date(2));
    assert_eq!(records[1].views_total, Some(15));
    assert_eq!(records[1].views_unique, Some(5));
    assert_eq!(records[1].clones_total, Some(5));
    assert_eq!(records[1].clones_unique, Some(2));

    assert_eq!(records[2].record_date, date(3));
    assert_eq!(records[2].views_total, None);
    assert_eq!(records[2].clones_total, Some(8));

    for r in &records {
        assert_eq!(r.stars_count, Some(150));
        assert_eq!(r.forks_count, Some(25));
        assert_eq!(r.collected_at, collected_at);
    }
}

#[tokio::test]
async fn test_collect_repo_any_failed_request_yields_nothing() {
    let mut source = MockSource::new();
    source
        .expect_get_views()
        .returning(|_, _| Ok(traffic(&[(1, 10, 3)])));
    source
        .expect_get_clones()
        .returning(|_, _| Ok(traffic(&[(1, 2, 1)])));
    source.expect_get_repo_stats().returning(|_, _| {
        Err(GitHubError::RateLimited {
            reset_at: Utc.timestamp_opt(1_704_067_200, 0).single(),
        })
    });

    let records = collect_repo(&source, &repo("floris"), Utc::now()).await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_collect_all_isolates_failures_and_upserts_once() {
    let dir = tempdir().unwrap();
    let store = StatsStore::new(dir.path().join("stats.parquet"));
    let source = floris_source();
    let metrics = CollectorMetrics::new().unwrap();

    let summary = collect_all(
        &source,
        &[repo("missing"), repo("floris")],
        &store,
        CollectOptions::default(),
        Some(&metrics),
    )
    .await
    .unwrap();

    assert_eq!(summary.repos_total, 2);
    assert_eq!(summary.repos_failed, 1);
    assert_eq!(summary.records_stored, 3);

    let frame = store.read().unwrap();
    assert_eq!(frame.len(), 3);
    assert!(frame.iter().all(|r| r.repo_name == "floris"));

    assert_eq!(metrics.repo_collections.with_label_values(&["ok"]).get(), 1);
    assert_eq!(metrics.repo_collections.with_label_values(&["failed"]).get(), 1);
    assert_eq!(metrics.records_upserted.get(), 3);
    assert_eq!(metrics.store_rows.get(), 3);
}

#[tokio::test]
async fn test_rerun_replaces_days_instead_of_duplicating() {
    let dir = tempdir().unwrap();
    let store = StatsStore::new(dir.path().join("stats.parquet"));
    let repos = [repo("floris")];

    collect_all(&floris_source(), &repos, &store, CollectOptions::default(), None)
        .await
        .unwrap();

    // Next day: view window has slid forward, stars went up.
    let mut source = MockSource::new();
    source
        .expect_get_views()
        .returning(|_, _| Ok(traffic(&[(2, 20, 6), (4, 1, 1)])));
    source
        .expect_get_clones()
        .returning(|_, _| Ok(TrafficData::default()));
    source
        .expect_get_repo_stats()
        .returning(|_, _| Ok(stats(151)));

    let metrics = CollectorMetrics::new().unwrap();
    let summary = collect_all(&source, &repos, &store, CollectOptions::default(), Some(&metrics))
        .await
        .unwrap();
    assert_eq!(summary.records_stored, 2);
    // Gauge counts every row on disk, not just this run's batch.
    assert_eq!(metrics.records_upserted.get(), 2);
    assert_eq!(metrics.store_rows.get(), 4);

    let rows = store.read().unwrap().into_records();
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.record_date).collect();
    assert_eq!(dates, vec![date(1), date(2), date(3), date(4)]);

    // Day 2 was replaced wholesale: clone fields from the first run are gone.
    let day2 = &rows[1];
    assert_eq!(day2.views_total, Some(20));
    assert_eq!(day2.clones_total, None);
    assert_eq!(day2.stars_count, Some(151));

    // Day 3 untouched.
    assert_eq!(rows[2].clones_total, Some(8));
    assert_eq!(rows[2].stars_count, Some(150));
}

#[tokio::test]
async fn test_dry_run_makes_no_requests_and_no_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stats.parquet");
    let store = StatsStore::new(&path);
    let source = MockSource::new();

    let summary = collect_all(
        &source,
        &[repo("floris"), repo("wombat")],
        &store,
        CollectOptions {
            concurrency: 1,
            dry_run: true,
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.repos_total, 2);
    assert_eq!(summary.records_stored, 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_all_failures_leave_store_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stats.parquet");
    let store = StatsStore::new(&path);

    let summary = collect_all(
        &floris_source(),
        &[repo("missing"), repo("gone")],
        &store,
        CollectOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.repos_failed, 2);
    assert_eq!(summary.records_stored, 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_concurrent_collection_stores_every_repository() {
    let dir = tempdir().unwrap();
    let store = StatsStore::new(dir.path().join("stats.parquet"));

    let mut source = MockSource::new();
    source
        .expect_get_views()
        .times(4)
        .returning(|_, _| Ok(traffic(&[(1, 1, 1)])));
    source
        .expect_get_clones()
        .times(4)
        .returning(|_, _| Ok(TrafficData::default()));
    source
        .expect_get_repo_stats()
        .times(4)
        .returning(|_, _| Ok(stats(1)));

    let repos: Vec<RepoConfig> = ["a", "b", "c", "d"].into_iter().map(repo).collect();
    let summary = collect_all(
        &source,
        &repos,
        &store,
        CollectOptions {
            concurrency: 4,
            dry_run: false,
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.records_stored, 4);
    let names: Vec<String> = store
        .read()
        .unwrap()
        .into_records()
        .into_iter()
        .map(|r| r.repo_name)
        .collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_get_stats_after_collection() {
    let dir = tempdir().unwrap();
    let store = StatsStore::new(dir.path().join("stats.parquet"));
    collect_all(&floris_source(), &[repo("floris")], &store, CollectOptions::default(), None)
        .await
        .unwrap();

    let window = store
        .get_stats(&StatsFilter::default().repo("floris").since(date(2)).until(date(3)))
        .unwrap();
    assert_eq!(window.len(), 2);

    let nothing = store
        .get_stats(&StatsFilter::default().repo("wombat"))
        .unwrap();
    assert!(nothing.is_empty());
    assert_eq!(nothing.column_names().len(), 10);
}

#[tokio::test]
async fn test_fetch_releases_skips_failed_repositories() {
    let mut source = MockSource::new();
    source
        .expect_get_releases()
        .with(always(), eq("floris"), eq(100u8))
        .returning(|_, _, _| {
            Ok(vec![Release {
                tag_name: "v4.0".to_string(),
                published_at: date(5),
                name: "FLORIS v4".to_string(),
            }])
        });
    source
        .expect_get_releases()
        .with(always(), eq("private"), always())
        .returning(|_, _, _| {
            Err(GitHubError::Authentication {
                message: "access forbidden".to_string(),
            })
        });

    let releases = fetch_releases(&source, &[repo("floris"), repo("private")]).await;

    assert_eq!(releases.len(), 1);
    assert_eq!(releases["floris"][0].tag_name, "v4.0");
    assert!(!releases.contains_key("private"));
}
