//! Use Cases Layer - Application Workflows
//!
//! Orchestrates domain logic with port interfaces to implement the
//! collector's workflows. Each use case is a self-contained operation.
//!
//! Use cases:
//! - `collector`: fetch, merge, and upsert a run over all repositories
//! - `releases`: release lookup for chart annotations
//! - `report`: per-repository totals over stored traffic

pub mod collector;
pub mod releases;
pub mod report;

pub use collector::{CollectOptions, CollectSummary, collect_all, collect_repo, try_collect_repo};
pub use releases::fetch_releases;
pub use report::{RepoSummary, summarize};
