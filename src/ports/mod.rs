//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `TrafficSource`: repository traffic, counters, and releases

pub mod traffic_source;

pub use traffic_source::{MAX_RELEASES_PAGE, TrafficSource};
