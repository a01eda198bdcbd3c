//! Prometheus metrics for the Concord transaction manager
//!
//! Provides centralized metrics collection for monitoring:
//! - Transaction message dispatch
//! - Status reports
//! - Group purges

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, opts, register_histogram,
    register_int_counter, register_int_counter_vec,
};

// ============================================================================
// Dispatch Metrics
// ============================================================================

/// Total number of transaction messages published and persisted
pub static MSGS_DISPATCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "concord_msgs_dispatched_total",
        "Total number of transaction messages published and persisted"
    ))
    .expect("Failed to register MSGS_DISPATCHED_TOTAL metric")
});

/// Total number of failed dispatch attempts (publish or persist)
pub static MSG_DISPATCH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "concord_msg_dispatch_failures_total",
        "Total number of failed dispatch attempts"
    ))
    .expect("Failed to register MSG_DISPATCH_FAILURES metric")
});

/// Histogram of per-message dispatch latency (publish + persist)
pub static DISPATCH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "concord_dispatch_latency_seconds",
        "Per-message dispatch latency"
    )
    .expect("Failed to register DISPATCH_LATENCY metric")
});

// ============================================================================
// Coordinator Metrics
// ============================================================================

/// Status reports by outcome ("ok" or the error code)
pub static STATUS_REPORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "concord_status_reports_total",
            "Status reports processed, by outcome"
        ),
        &["outcome"]
    )
    .expect("Failed to register STATUS_REPORTS_TOTAL metric")
});

/// Transaction items removed by group purges
pub static ITEMS_PURGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "concord_items_purged_total",
        "Transaction items removed by group purges"
    ))
    .expect("Failed to register ITEMS_PURGED_TOTAL metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        MSGS_DISPATCHED_TOTAL.inc();
        STATUS_REPORTS_TOTAL.with_label_values(&["ok"]).inc();

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("concord_msgs_dispatched_total"));
        assert!(metrics_text.contains("concord_status_reports_total"));
    }
}
