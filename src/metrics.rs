//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cronjob_label_events_total` - Watch notifications dispatched, by event type
//! - `cronjob_label_resyncs_filtered_total` - Update notifications dropped as resync echoes
//! - `cronjob_label_reconciliations_total` - Total number of reconciliations
//! - `cronjob_label_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `cronjob_label_updates_total` - CronJobs written back with a corrected label set
//! - `cronjob_label_update_errors_total` - Failed write-backs (dropped, not retried)

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cronjob_label_events_total",
            "Watch notifications dispatched, by event type",
        ),
        &["event"],
    )
    .expect("Failed to create EVENTS_TOTAL metric - this should never happen")
});

static RESYNCS_FILTERED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cronjob_label_resyncs_filtered_total",
        "Update notifications dropped because the resourceVersion was unchanged",
    )
    .expect("Failed to create RESYNCS_FILTERED_TOTAL metric - this should never happen")
});

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cronjob_label_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cronjob_label_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cronjob_label_updates_total",
        "CronJobs written back with a corrected label set",
    )
    .expect("Failed to create UPDATES_TOTAL metric - this should never happen")
});

static UPDATE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cronjob_label_update_errors_total",
        "Failed CronJob write-backs",
    )
    .expect("Failed to create UPDATE_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate registration"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESYNCS_FILTERED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(UPDATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPDATE_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn record_event(event: &str) {
    EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn increment_resyncs_filtered() {
    RESYNCS_FILTERED_TOTAL.inc();
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn observe_reconcile_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_updates() {
    UPDATES_TOTAL.inc();
}

pub fn increment_update_errors() {
    UPDATE_ERRORS_TOTAL.inc();
}
