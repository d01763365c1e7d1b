//! Storage Adapter - Parquet Time-Series Store
//!
//! Persists traffic records in a single Parquet file keyed by
//! (date, owner, name). Writes go through a temp file and a rename so the
//! file on disk is always either the previous or the new version.
//!
//! Sub-modules:
//! - `schema`: fixed ten-column Arrow schema and batch conversions
//! - `frame`: in-memory dataset, filters, key-based merge, CSV/JSON export
//! - `parquet_store`: the `StatsStore` file adapter

pub mod frame;
pub mod parquet_store;
pub mod schema;

pub use frame::{StatsFilter, TrafficFrame};
pub use parquet_store::{StatsStore, UpsertOutcome};
pub use schema::{COLUMNS, Compression, stats_schema};

/// Parquet store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create directory
    #[error("failed to create directory: {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Parquet read/write error
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow error
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Stored data does not fit the traffic schema
    #[error("schema mismatch: {0}")]
    Schema(String),
}
