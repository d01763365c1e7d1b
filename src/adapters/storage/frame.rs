//! In-memory traffic dataset
//!
//! `TrafficFrame` is what the store reads, writes, and returns from
//! queries: rows of [`TrafficRecord`] that always expose the fixed
//! ten-column schema, even when empty. The key-based merge behind upsert
//! lives here as well.

use std::collections::HashSet;
use std::io::Write;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use chrono::NaiveDate;

use super::StoreError;
use super::schema::{records_to_record_batch, stats_schema};
use crate::domain::TrafficRecord;

/// Optional filters for `StatsStore::get_stats`.
///
/// Date bounds are inclusive. An empty repository name means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub repo_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl StatsFilter {
    #[must_use]
    pub fn repo(mut self, name: impl Into<String>) -> Self {
        self.repo_name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn since(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    #[must_use]
    pub const fn until(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Whether a record passes every filter that is set.
    pub fn matches(&self, record: &TrafficRecord) -> bool {
        let repo_ok = self
            .repo_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .is_none_or(|name| record.repo_name == name);
        let start_ok = self.start_date.is_none_or(|d| record.record_date >= d);
        let end_ok = self.end_date.is_none_or(|d| record.record_date <= d);
        repo_ok && start_ok && end_ok
    }
}

/// Tabular traffic dataset with the fixed store schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficFrame {
    rows: Vec<TrafficRecord>,
}

impl TrafficFrame {
    /// Empty dataset (still exposes all schema columns).
    pub const fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub const fn from_records(rows: Vec<TrafficRecord>) -> Self {
        Self { rows }
    }

    pub fn schema(&self) -> SchemaRef {
        stats_schema()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TrafficRecord] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrafficRecord> {
        self.rows.iter()
    }

    pub fn into_records(self) -> Vec<TrafficRecord> {
        self.rows
    }

    /// Sort ascending by (owner, name, date).
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self
    }

    /// Rows passing `filter`, order preserved.
    #[must_use]
    pub fn filter(self, filter: &StatsFilter) -> Self {
        Self {
            rows: self.rows.into_iter().filter(|r| filter.matches(r)).collect(),
        }
    }

    /// Replace every row whose (date, owner, name) key appears in
    /// `incoming`, append `incoming`, and sort.
    ///
    /// Replacement is whole-row: a field absent in the incoming record is
    /// absent afterwards even if the old row had it. Duplicate keys inside
    /// `incoming` are all kept.
    #[must_use]
    pub fn merge(self, incoming: Vec<TrafficRecord>) -> Self {
        let mut rows = self.rows;
        {
            let keys: HashSet<(NaiveDate, &str, &str)> = incoming
                .iter()
                .map(|r| (r.record_date, r.repo_owner.as_str(), r.repo_name.as_str()))
                .collect();
            rows.retain(|r| !keys.contains(&(r.record_date, r.repo_owner.as_str(), r.repo_name.as_str())));
        }
        rows.extend(incoming);
        Self { rows }.sorted()
    }

    /// The whole frame as a single Arrow batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch, StoreError> {
        records_to_record_batch(&self.rows, self.schema())
    }

    /// Write CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        let batch = self.to_record_batch()?;
        let mut csv = arrow::csv::WriterBuilder::new().with_header(true).build(writer);
        csv.write(&batch)?;
        Ok(())
    }

    /// Write a JSON array of row objects. Null metrics are omitted.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        let batch = self.to_record_batch()?;
        let mut json = arrow::json::ArrayWriter::new(writer);
        json.write(&batch)?;
        json.finish()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TrafficFrame {
    type Item = &'a TrafficRecord;
    type IntoIter = std::slice::Iter<'a, TrafficRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(d: u32, name: &str, views: Option<u64>) -> TrafficRecord {
        let mut r = TrafficRecord::new(date(d), "NatLabRockies", name, Utc::now());
        r.views_total = views;
        r
    }

    #[test]
    fn test_empty_frame_exposes_schema() {
        let frame = TrafficFrame::empty();
        assert!(frame.is_empty());
        let columns = frame.column_names();
        assert_eq!(columns.len(), 10);
        assert!(columns.contains(&"date".to_string()));
        assert!(columns.contains(&"collected_at".to_string()));
    }

    #[test]
    fn test_merge_replaces_whole_row() {
        let mut old = record(1, "floris", Some(100));
        old.clones_total = Some(7);
        let frame = TrafficFrame::from_records(vec![old]);

        let merged = frame.merge(vec![record(1, "floris", Some(200))]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.rows()[0].views_total, Some(200));
        assert_eq!(merged.rows()[0].clones_total, None);
    }

    #[test]
    fn test_merge_keeps_other_keys_and_sorts() {
        let frame = TrafficFrame::from_records(vec![record(3, "floris", Some(3)), record(1, "wombat", Some(1))]);
        let merged = frame.merge(vec![record(2, "floris", Some(2))]);

        let keys: Vec<(&str, NaiveDate)> = merged
            .iter()
            .map(|r| (r.repo_name.as_str(), r.record_date))
            .collect();
        assert_eq!(keys, vec![("floris", date(2)), ("floris", date(3)), ("wombat", date(1))]);
    }

    #[test]
    fn test_filter_by_repo_and_dates() {
        let frame = TrafficFrame::from_records(vec![
            record(1, "floris", None),
            record(2, "floris", None),
            record(2, "wombat", None),
        ]);

        let floris = frame.clone().filter(&StatsFilter::default().repo("floris"));
        assert_eq!(floris.len(), 2);

        let window = frame.clone().filter(&StatsFilter::default().since(date(2)).until(date(2)));
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|r| r.record_date == date(2)));

        let any = frame.filter(&StatsFilter::default().repo(""));
        assert_eq!(any.len(), 3);
    }

    #[test]
    fn test_write_csv_has_header_and_rows() {
        let frame = TrafficFrame::from_records(vec![record(1, "floris", Some(100))]);
        let mut out = Vec::new();
        frame.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("date,repo_owner,repo_name"));
        assert!(lines.next().unwrap().starts_with("2024-01-01,NatLabRockies,floris"));
    }

    #[test]
    fn test_write_json_array() {
        let frame = TrafficFrame::from_records(vec![record(1, "floris", Some(100))]);
        let mut out = Vec::new();
        frame.write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["repo_name"], "floris");
        assert_eq!(value[0]["views_total"], 100);
    }
}
