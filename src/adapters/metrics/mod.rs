//! Metrics Adapter
//!
//! Prometheus counters for API calls and collection outcomes, rendered as
//! text exposition at the end of a run.

pub mod prometheus;

pub use self::prometheus::CollectorMetrics;
