//! Prometheus metrics for recon-engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for session operations by operation and status.
pub static SESSION_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recon_session_operations_total",
        "Total number of reconciliation session operations",
        &["operation", "status"]
    )
    .expect("Failed to register SESSION_OPERATIONS")
});

/// Counter for per-payment reconcile commits.
pub static PAYMENT_COMMITS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recon_payment_commits_total",
        "Total number of per-payment reconcile commits",
        &["status"]
    )
    .expect("Failed to register PAYMENT_COMMITS")
});

/// Histogram for store operation duration.
pub static STORE_OP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "recon_store_op_duration_seconds",
        "Store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register STORE_OP_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recon_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SESSION_OPERATIONS);
    Lazy::force(&PAYMENT_COMMITS);
    Lazy::force(&STORE_OP_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a session operation.
pub fn record_session_operation(operation: &str, status: &str) {
    SESSION_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}

/// Record a per-payment commit outcome.
pub fn record_payment_commit(status: &str) {
    PAYMENT_COMMITS.with_label_values(&[status]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
