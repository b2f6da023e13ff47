//! Prometheus metrics for the scheduler
//!
//! Counts and durations only, never targets or plaintexts.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::error::{Result, ServerError};

pub const OUTCOME_FOUND: &str = "found";
pub const OUTCOME_EXHAUSTED: &str = "exhausted";
pub const OUTCOME_STOPPED: &str = "stopped";

pub fn record_partitions_issued(count: usize) {
    counter!("partitions_issued_total").increment(count as u64);
}

pub fn record_partition_completed() {
    counter!("partitions_completed_total").increment(1);
}

pub fn record_partition_failed() {
    counter!("partitions_failed_total").increment(1);
}

pub fn set_workers_connected(count: usize) {
    gauge!("workers_connected").set(count as f64);
}

pub fn record_query(outcome: &str, duration: Duration) {
    counter!("queries_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("query_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Install the global Prometheus recorder
///
/// Fails if a recorder is already installed for this process.
pub fn init_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))
}
