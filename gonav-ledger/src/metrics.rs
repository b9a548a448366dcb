//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `gonav_writes_total` - Record writes committed (insert/update/delete)
//! - `gonav_sync_enqueue_failures_total` - Sync queue appends that failed and were dropped
//! - `gonav_sync_pending_changes` - Entries waiting in the sync queue
//! - `gonav_operation_duration_seconds` - Latency of ledger operations

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Record writes committed
    pub writes_total: IntCounter,

    /// Dropped sync queue appends
    pub enqueue_failures: IntCounter,

    /// Sync queue length
    pub pending_changes: IntGauge,

    /// Ledger operation latency
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let writes_total = IntCounter::new("gonav_writes_total", "Record writes committed")?;
        registry.register(Box::new(writes_total.clone()))?;

        let enqueue_failures = IntCounter::new(
            "gonav_sync_enqueue_failures_total",
            "Sync queue appends that failed and were dropped",
        )?;
        registry.register(Box::new(enqueue_failures.clone()))?;

        let pending_changes = IntGauge::new(
            "gonav_sync_pending_changes",
            "Entries waiting in the sync queue",
        )?;
        registry.register(Box::new(pending_changes.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gonav_operation_duration_seconds",
                "Latency of ledger operations",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            writes_total,
            enqueue_failures,
            pending_changes,
            operation_duration,
            registry,
        })
    }

    /// Record committed writes
    pub fn record_writes(&self, count: usize) {
        self.writes_total.inc_by(count as u64);
    }

    /// Record a dropped sync queue append
    pub fn record_enqueue_failure(&self) {
        self.enqueue_failures.inc();
    }

    /// Update sync queue length
    pub fn set_pending_changes(&self, pending: u64) {
        self.pending_changes.set(pending as i64);
    }

    /// Record operation duration
    pub fn record_operation_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.writes_total.get(), 0);
        assert_eq!(metrics.pending_changes.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_writes(3);
        assert_eq!(first.writes_total.get(), 3);
        assert_eq!(second.writes_total.get(), 0);
    }

    #[test]
    fn test_pending_and_failures() {
        let metrics = Metrics::new().unwrap();
        metrics.set_pending_changes(7);
        metrics.record_enqueue_failure();
        metrics.record_operation_duration(0.002);

        assert_eq!(metrics.pending_changes.get(), 7);
        assert_eq!(metrics.enqueue_failures.get(), 1);
        assert_eq!(metrics.registry().gather().len(), 4);
    }
}
