//! Prometheus metrics for target construction and request mapping.
//!
//! Label lookups happen when a segment is built; the mapping path only
//! increments counters it already holds.

use prometheus::{Counter, CounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::io::MapResult;

/// Metrics collection for tables built from registered target types.
pub struct TargetMetrics {
    /// The Prometheus registry.
    pub registry: Registry,

    /// Requests mapped, by target type and result.
    pub requests_total: CounterVec,

    /// Successful constructs by target type.
    pub constructs_total: CounterVec,

    /// Failed constructs by target type and error kind.
    pub construct_failures_total: CounterVec,

    /// Target instances currently constructed and not yet destructed.
    pub active_instances: IntGauge,
}

/// Counters for one segment, resolved when the segment is built.
#[derive(Clone, Debug)]
pub struct SegmentCounters {
    remapped: Counter,
    failed: Counter,
}

impl SegmentCounters {
    /// Count one mapping outcome.
    #[inline]
    pub fn record(&self, result: MapResult) {
        match result {
            MapResult::Remapped => self.remapped.inc(),
            MapResult::Failed => self.failed.inc(),
        }
    }
}

impl TargetMetrics {
    /// Create a new metrics collection.
    ///
    /// # Panics
    ///
    /// Panics if metric registration fails (should not happen with unique names).
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new(
                "dm_target_requests_total",
                "Total number of requests mapped by target type and result",
            ),
            &["target", "result"],
        )
        .expect("metric creation should succeed");

        let constructs_total = CounterVec::new(
            Opts::new(
                "dm_target_constructs_total",
                "Total number of target instances constructed by target type",
            ),
            &["target"],
        )
        .expect("metric creation should succeed");

        let construct_failures_total = CounterVec::new(
            Opts::new(
                "dm_target_construct_failures_total",
                "Total number of failed target constructs by target type and error kind",
            ),
            &["target", "error"],
        )
        .expect("metric creation should succeed");

        let active_instances = IntGauge::new(
            "dm_target_active_instances",
            "Current number of constructed target instances",
        )
        .expect("metric creation should succeed");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(constructs_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(construct_failures_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(active_instances.clone()))
            .expect("metric registration should succeed");

        Self {
            registry,
            requests_total,
            constructs_total,
            construct_failures_total,
            active_instances,
        }
    }

    /// Resolve the request counters for a segment of `target`.
    #[must_use]
    pub fn segment_counters(&self, target: &str) -> SegmentCounters {
        SegmentCounters {
            remapped: self.requests_total.with_label_values(&[target, "remapped"]),
            failed: self.requests_total.with_label_values(&[target, "failed"]),
        }
    }

    /// Record a successful construct.
    pub fn record_construct(&self, target: &str) {
        self.constructs_total.with_label_values(&[target]).inc();
        self.active_instances.inc();
    }

    /// Record a failed construct.
    pub fn record_construct_failure(&self, target: &str, error_kind: &str) {
        self.construct_failures_total
            .with_label_values(&[target, error_kind])
            .inc();
    }

    /// Record a destruct.
    pub fn record_destruct(&self) {
        self.active_instances.dec();
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for TargetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TargetMetrics::new();
        assert!(metrics.encode().is_ok());
    }

    #[test]
    fn test_segment_counters_share_series() {
        let metrics = TargetMetrics::new();
        let first = metrics.segment_counters("linear");
        let second = metrics.segment_counters("linear");

        first.record(MapResult::Remapped);
        second.record(MapResult::Remapped);
        second.record(MapResult::Failed);

        let remapped = metrics
            .requests_total
            .with_label_values(&["linear", "remapped"])
            .get();
        assert!((remapped - 2.0).abs() < f64::EPSILON);

        let output = metrics.encode().unwrap();
        assert!(output.contains("dm_target_requests_total"));
        assert!(output.contains("result=\"failed\""));
    }

    #[test]
    fn test_construct_accounting() {
        let metrics = TargetMetrics::new();
        metrics.record_construct("linear");
        metrics.record_construct("io-err");
        metrics.record_destruct();
        metrics.record_construct_failure("linear", "device_resolution");

        assert_eq!(metrics.active_instances.get(), 1);
        let output = metrics.encode().unwrap();
        assert!(output.contains("dm_target_constructs_total"));
        assert!(output.contains("dm_target_construct_failures_total"));
        assert!(output.contains("error=\"device_resolution\""));
    }
}
