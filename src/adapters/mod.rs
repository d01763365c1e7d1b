//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, Parquet files, Prometheus). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `github`: GitHub REST client (auth, retries, error classification)
//! - `metrics`: Prometheus counters for a collection run
//! - `storage`: Parquet time-series store with key-based upsert

pub mod github;
pub mod metrics;
pub mod storage;
