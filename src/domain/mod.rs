//! Domain Layer - Traffic Records and Per-Day Merge
//!
//! Pure types and logic with no I/O: the persisted daily record and its
//! natural key, the transient API shapes, and the builder that merges one
//! run's view/clone responses into records.

pub mod record_builder;
pub mod traffic;

pub use record_builder::{TrafficRecordBuilder, build_records};
pub use traffic::{DailyCount, Release, RepoStats, TrafficData, TrafficKey, TrafficRecord};
