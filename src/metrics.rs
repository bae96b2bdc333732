// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the nestlb projection engine.
//!
//! All metrics carry the namespace prefix `nestlb_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliations of guest objects and their outcomes
//! - **Host Object Metrics** - Track writes to host Services and Ingresses
//! - **Error Metrics** - Track error conditions and persistent failures
//! - **Projection State** - Track the size of the aggregated indexes
//!
//! # Example
//!
//! ```rust,no_run
//! use nestlb::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Service", std::time::Duration::from_millis(20));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all nestlb metrics
const METRICS_NAMESPACE: &str = "nestlb";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of guest object (`Service`, `Ingress`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of guest object
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `resource_type`: Kind of guest object
/// - `reason`: Error category that caused the requeue
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Host Object Metrics
// ============================================================================

/// Total number of operations on host objects
///
/// Labels:
/// - `resource_type`: Kind of host object (`Service`, `Ingress`)
/// - `result`: `created`, `updated`, `unchanged` or `deleted`
pub static HOST_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_host_operations_total"),
        "Total number of host object operations by type and result",
    );
    let counter = CounterVec::new(opts, &["resource_type", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error category
///
/// Labels:
/// - `resource_type`: Kind of guest object
/// - `error_type`: Category of error (`api_error`, `conflict`, `timeout`, ...)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error category",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of objects that crossed the persistent failure threshold
///
/// Labels:
/// - `resource_type`: Kind of guest object
pub static TERMINAL_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_terminal_failures_total"),
        "Total number of objects failing reconciliation persistently",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Projection State
// ============================================================================

/// Number of node ports exposed on the host load-balancer Service
pub static TRACKED_NODE_PORTS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_tracked_node_ports"),
        "Number of guest node ports exposed on the host load-balancer Service",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of guest Ingresses per ingress class
///
/// Labels:
/// - `class`: Guest ingress class name
pub static INGRESS_CLASS_MEMBERS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ingress_class_members"),
        "Number of guest Ingresses aggregated per ingress class",
    );
    let gauge = GaugeVec::new(opts, &["class"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of object reconciled
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of object reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
///
/// # Arguments
/// * `resource_type` - The kind of object reconciled
/// * `reason` - Error category behind the requeue
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record an operation on a host object
pub fn record_host_operation(resource_type: &str, result: &str) {
    HOST_OPERATIONS_TOTAL
        .with_label_values(&[resource_type, result])
        .inc();
}

/// Record an error
///
/// # Arguments
/// * `resource_type` - The kind of object where error occurred
/// * `error_type` - Category of error (e.g., `api_error`, `conflict`)
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Record an object crossing the persistent failure threshold
pub fn record_terminal_failure(resource_type: &str) {
    TERMINAL_FAILURES_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_node_ports(count: usize) {
    TRACKED_NODE_PORTS.set(count as f64);
}

#[allow(clippy::cast_precision_loss)]
pub fn set_class_members(class: &str, count: usize) {
    INGRESS_CLASS_MEMBERS
        .with_label_values(&[class])
        .set(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
