//! Record Builder - Per-Day Merge of View and Clone Traffic
//!
//! Turns one collection run's API responses for a single repository into
//! one [`TrafficRecord`] per day. View days are inserted first; clone days
//! either fill in the matching view day or open a new day of their own.
//! The mutable drafts never leave this module: `build` hands back finished
//! records and drops the scratch state.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::traffic::{RepoStats, TrafficData, TrafficRecord};

/// Scratch state for one day while merging.
#[derive(Debug)]
struct DayDraft {
    date: NaiveDate,
    views: Option<(u64, u64)>,
    clones: Option<(u64, u64)>,
}

/// Builds the per-day records of one repository for one collection run.
pub struct TrafficRecordBuilder<'a> {
    repo_owner: &'a str,
    repo_name: &'a str,
    stats: RepoStats,
    collected_at: DateTime<Utc>,
    /// Drafts in first-seen order.
    drafts: Vec<DayDraft>,
    /// Date -> index into `drafts`.
    index: HashMap<NaiveDate, usize>,
}

impl<'a> TrafficRecordBuilder<'a> {
    /// Start a builder. The repo stats snapshot is stamped onto every day.
    pub fn new(
        repo_owner: &'a str,
        repo_name: &'a str,
        stats: RepoStats,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            repo_owner,
            repo_name,
            stats,
            collected_at,
            drafts: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn draft_mut(&mut self, date: NaiveDate) -> &mut DayDraft {
        let idx = *self.index.entry(date).or_insert_with(|| {
            self.drafts.push(DayDraft {
                date,
                views: None,
                clones: None,
            });
            self.drafts.len() - 1
        });
        &mut self.drafts[idx]
    }

    /// Add view days. A repeated date keeps the last entry seen.
    pub fn with_views(mut self, views: &TrafficData) -> Self {
        for item in &views.items {
            self.draft_mut(item.date).views = Some((item.count, item.uniques));
        }
        self
    }

    /// Add clone days, merging into existing view days by date.
    pub fn with_clones(mut self, clones: &TrafficData) -> Self {
        for item in &clones.items {
            self.draft_mut(item.date).clones = Some((item.count, item.uniques));
        }
        self
    }

    /// Finish the run: one immutable record per day, in insertion order.
    pub fn build(self) -> Vec<TrafficRecord> {
        let Self {
            repo_owner,
            repo_name,
            stats,
            collected_at,
            drafts,
            ..
        } = self;

        drafts
            .into_iter()
            .map(|draft| TrafficRecord {
                record_date: draft.date,
                repo_owner: repo_owner.to_string(),
                repo_name: repo_name.to_string(),
                clones_total: draft.clones.map(|(count, _)| count),
                clones_unique: draft.clones.map(|(_, uniques)| uniques),
                views_total: draft.views.map(|(count, _)| count),
                views_unique: draft.views.map(|(_, uniques)| uniques),
                forks_count: Some(stats.forks_count),
                stars_count: Some(stats.stargazers_count),
                collected_at,
            })
            .collect()
    }
}

/// Merge one repository's views, clones, and stats snapshot into records.
pub fn build_records(
    repo_owner: &str,
    repo_name: &str,
    views: &TrafficData,
    clones: &TrafficData,
    stats: RepoStats,
    collected_at: DateTime<Utc>,
) -> Vec<TrafficRecord> {
    TrafficRecordBuilder::new(repo_owner, repo_name, stats, collected_at)
        .with_views(views)
        .with_clones(clones)
        .build()
}
