//! Prometheus metrics for order-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "order_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for orders placed through checkout.
pub static ORDERS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_orders_created_total",
        "Total number of orders created at checkout",
        &["payment_method"]
    )
    .expect("Failed to register ORDERS_CREATED")
});

/// Counter for payment webhook reconciliations by outcome.
pub static PAYMENT_RECONCILIATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_payment_reconciliations_total",
        "Total number of payment reconciliations",
        &["outcome"]
    )
    .expect("Failed to register PAYMENT_RECONCILIATIONS")
});

/// Counter for webhooks rejected because the reference lock was held.
pub static LOCK_CONTENTION: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_lock_contention_total",
        "Total number of lock acquisitions that found the lock held",
        &["lock"]
    )
    .expect("Failed to register LOCK_CONTENTION")
});

/// Counter for order status transitions.
pub static STATUS_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_status_transitions_total",
        "Total number of order status transitions",
        &["from", "to"]
    )
    .expect("Failed to register STATUS_TRANSITIONS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ORDERS_CREATED);
    Lazy::force(&PAYMENT_RECONCILIATIONS);
    Lazy::force(&LOCK_CONTENTION);
    Lazy::force(&STATUS_TRANSITIONS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}

/// Record an order created at checkout.
pub fn record_order_created(payment_method: &str) {
    ORDERS_CREATED.with_label_values(&[payment_method]).inc();
}

/// Record a reconciliation outcome.
pub fn record_reconciliation(outcome: &str) {
    PAYMENT_RECONCILIATIONS.with_label_values(&[outcome]).inc();
}

/// Record a held lock.
pub fn record_lock_contention(lock: &str) {
    LOCK_CONTENTION.with_label_values(&[lock]).inc();
}

/// Record a status transition.
pub fn record_status_transition(from: &str, to: &str) {
    STATUS_TRANSITIONS.with_label_values(&[from, to]).inc();
}
