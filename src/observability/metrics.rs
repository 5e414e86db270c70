//! # Metrics
//!
//! Prometheus metrics for monitoring reconciliation.
//!
//! ## Metrics Exposed
//!
//! - `federation_reconciliations_total` - Controller operations by resource and operation
//! - `federation_reconciliation_errors_total` - Failed controller operations by error kind
//! - `federation_reconciliation_duration_seconds` - Duration of controller operations
//! - `federation_partial_failures_total` - Failures that left remote state partially applied
//! - `federation_drift_detected_total` - Records found missing remotely and cleared
//! - `federation_remote_calls_total` - Remote calls by service and call
//! - `federation_remote_call_errors_total` - Failed remote calls by service and call
//! - `federation_remote_call_duration_seconds` - Duration of remote calls by service
//! - `federation_revocation_wait_seconds` - Time spent between credential revoke and set

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_reconciliations_total",
            "Total number of controller operations by resource and operation",
        ),
        &["resource", "operation"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_reconciliation_errors_total",
            "Total number of failed controller operations by error kind",
        ),
        &["resource", "operation", "kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "federation_reconciliation_duration_seconds",
            "Duration of controller operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &["resource", "operation"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PARTIAL_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_partial_failures_total",
            "Total number of failures that left remote state partially applied",
        ),
        &["resource", "operation"],
    )
    .expect("Failed to create PARTIAL_FAILURES_TOTAL metric - this should never happen")
});

static DRIFT_DETECTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_drift_detected_total",
            "Total number of records found missing remotely and cleared",
        ),
        &["resource"],
    )
    .expect("Failed to create DRIFT_DETECTED_TOTAL metric - this should never happen")
});

static REMOTE_CALLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_remote_calls_total",
            "Total number of remote calls by service and call",
        ),
        &["service", "call"],
    )
    .expect("Failed to create REMOTE_CALLS_TOTAL metric - this should never happen")
});

static REMOTE_CALL_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "federation_remote_call_errors_total",
            "Total number of failed remote calls by service and call",
        ),
        &["service", "call"],
    )
    .expect("Failed to create REMOTE_CALL_ERRORS_TOTAL metric - this should never happen")
});

static REMOTE_CALL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "federation_remote_call_duration_seconds",
            "Duration of remote calls in seconds by service",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["service"],
    )
    .expect("Failed to create REMOTE_CALL_DURATION metric - this should never happen")
});

static REVOCATION_WAIT: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "federation_revocation_wait_seconds",
            "Time spent waiting for credential revocation before setting new credentials",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
    )
    .expect("Failed to create REVOCATION_WAIT metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all metrics with `REGISTRY`
///
/// Fails if called twice, since Prometheus rejects duplicate registration.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PARTIAL_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DRIFT_DETECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALL_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALL_DURATION.clone()))?;
    REGISTRY.register(Box::new(REVOCATION_WAIT.clone()))?;

    Ok(())
}

pub fn record_reconciliation(resource: &str, operation: &str, duration: f64) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[resource, operation])
        .inc();
    RECONCILIATION_DURATION
        .with_label_values(&[resource, operation])
        .observe(duration);
}

pub fn increment_reconciliation_errors(resource: &str, operation: &str, kind: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[resource, operation, kind])
        .inc();
}

pub fn increment_partial_failures(resource: &str, operation: &str) {
    PARTIAL_FAILURES_TOTAL
        .with_label_values(&[resource, operation])
        .inc();
}

pub fn increment_drift_detected(resource: &str) {
    DRIFT_DETECTED_TOTAL.with_label_values(&[resource]).inc();
}

pub fn record_remote_call(service: &str, call: &str, duration: f64) {
    REMOTE_CALLS_TOTAL.with_label_values(&[service, call]).inc();
    REMOTE_CALL_DURATION
        .with_label_values(&[service])
        .observe(duration);
}

pub fn increment_remote_call_errors(service: &str, call: &str) {
    REMOTE_CALL_ERRORS_TOTAL
        .with_label_values(&[service, call])
        .inc();
}

pub fn observe_revocation_wait(duration: f64) {
    REVOCATION_WAIT.observe(duration);
}

/// Current value of `federation_drift_detected_total` for a resource
pub fn drift_detected(resource: &str) -> u64 {
    DRIFT_DETECTED_TOTAL.with_label_values(&[resource]).get()
}
