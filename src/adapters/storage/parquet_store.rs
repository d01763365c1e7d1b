//! Stats Store - Deduplicated Parquet Persistence
//!
//! Reads and rewrites one Parquet file holding every traffic row. Upsert
//! is an anti-join on (date, owner, name) followed by an append and a
//! sort, then a full rewrite. The rewrite goes to `<file>.tmp` first and
//! is renamed over the target, so an interrupted upsert leaves the
//! previous file untouched.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info, instrument};

use super::StoreError;
use super::frame::{StatsFilter, TrafficFrame};
use super::schema::{Compression, record_batch_to_records};
use crate::domain::TrafficRecord;

/// Counts reported by [`StatsStore::upsert_counted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Records handed in.
    pub submitted: usize,
    /// Rows in the file after the write.
    pub total_rows: usize,
}

/// File-backed traffic store.
///
/// Single writer, single process. Concurrent writers from several
/// processes are not coordinated.
#[derive(Debug, Clone)]
pub struct StatsStore {
    /// Path to the Parquet file.
    data_path: PathBuf,
    /// Codec used on write.
    compression: Compression,
}

impl StatsStore {
    /// Store backed by `data_path`. Nothing is touched until the first call.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            compression: Compression::default(),
        }
    }

    #[must_use]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .data_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.data_path.with_file_name(name)
    }

    /// Load the full dataset.
    ///
    /// A missing or zero-length file is an empty dataset, not an error.
    #[instrument(skip(self), fields(path = %self.data_path.display()))]
    pub fn read(&self) -> Result<TrafficFrame, StoreError> {
        if !self.data_path.exists() {
            debug!("No stats file yet, returning empty dataset");
            return Ok(TrafficFrame::empty());
        }

        let file = File::open(&self.data_path)?;
        if file.metadata()?.len() == 0 {
            return Ok(TrafficFrame::empty());
        }

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let mut rows = Vec::new();
        for batch in reader {
            rows.extend(record_batch_to_records(&batch?)?);
        }

        debug!(rows = rows.len(), "Stats loaded");
        Ok(TrafficFrame::from_records(rows))
    }

    /// Persist `frame` as the whole dataset, atomically.
    ///
    /// Creates parent directories as needed. An empty frame writes a valid
    /// file carrying only the schema.
    #[instrument(skip(self, frame), fields(path = %self.data_path.display(), rows = frame.len()))]
    pub fn write(&self, frame: &TrafficFrame) -> Result<(), StoreError> {
        if let Some(parent) = self.data_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let tmp_path = self.tmp_path();
        if let Err(e) = self.write_file(&tmp_path, frame) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // Atomic rename
        fs::rename(&tmp_path, &self.data_path)?;

        debug!("Stats file written");
        Ok(())
    }

    fn write_file(&self, path: &Path, frame: &TrafficFrame) -> Result<(), StoreError> {
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .build();

        let mut writer = ArrowWriter::try_new(file, frame.schema(), Some(props))?;
        if !frame.is_empty() {
            writer.write(&frame.to_record_batch()?)?;
        }
        let file = writer.into_inner()?;
        file.sync_all()?;
        Ok(())
    }

    /// Merge `new_records` into the stored dataset by key and persist.
    ///
    /// Every stored row sharing a (date, owner, name) key with an incoming
    /// record is dropped, the incoming records are appended, and the result
    /// is sorted by (owner, name, date). Returns the number of records
    /// submitted; an empty batch is a no-op returning 0.
    pub fn upsert(&self, new_records: Vec<TrafficRecord>) -> Result<usize, StoreError> {
        Ok(self.upsert_counted(new_records)?.submitted)
    }

    /// [`upsert`](Self::upsert), also reporting the row count now on disk.
    ///
    /// An empty batch touches nothing and reports `total_rows: 0` without
    /// reading the file.
    #[instrument(skip(self, new_records), fields(path = %self.data_path.display(), incoming = new_records.len()))]
    pub fn upsert_counted(&self, new_records: Vec<TrafficRecord>) -> Result<UpsertOutcome, StoreError> {
        if new_records.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let submitted = new_records.len();
        let existing = self.read()?;
        let previous_rows = existing.len();

        let merged = if existing.is_empty() {
            TrafficFrame::from_records(new_records).sorted()
        } else {
            existing.merge(new_records)
        };

        self.write(&merged)?;

        info!(
            submitted,
            previous_rows,
            total_rows = merged.len(),
            "Stats upserted"
        );
        Ok(UpsertOutcome {
            submitted,
            total_rows: merged.len(),
        })
    }

    /// Rows matching `filter`, sorted by (owner, name, date).
    ///
    /// No matches, or no file at all, yield an empty dataset.
    pub fn get_stats(&self, filter: &StatsFilter) -> Result<TrafficFrame, StoreError> {
        let frame = self.read()?;
        if frame.is_empty() {
            return Ok(frame);
        }
        Ok(frame.filter(filter).sorted())
    }
}
