//! Metrics for the target-type core.
//!
//! Provides Prometheus-compatible counters for segment construction and
//! request mapping outcomes.

pub mod prometheus;

pub use self::prometheus::{SegmentCounters, TargetMetrics};
