//! Metrics instrumentation for mesh-dns.
//!
//! All metrics are prefixed with `mesh_dns.`

use hickory_proto::rr::RecordType;
use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a handled DNS question.
pub fn record_query(record_type: RecordType, outcome: QueryOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        QueryOutcome::Answered => "answered",
        QueryOutcome::NoData => "nodata",
        QueryOutcome::NxDomain => "nxdomain",
        QueryOutcome::Refused => "refused",
    };

    counter!("mesh_dns.query.count", "type" => record_type.to_string(), "outcome" => outcome_str)
        .increment(1);
    histogram!("mesh_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// How a question was answered, for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryOutcome {
    /// At least one answer record (includes the ANY placeholder and
    /// apex SOA/NS responses).
    Answered,
    /// Name exists, requested type has no data.
    NoData,
    /// Name not found under a served suffix.
    NxDomain,
    /// Name outside every served suffix.
    Refused,
}

/// Record a refresh attempt.
pub fn record_refresh(outcome: RefreshOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        RefreshOutcome::Success => "success",
        RefreshOutcome::Failure => "failure",
    };

    counter!("mesh_dns.refresh.count", "outcome" => outcome_str).increment(1);
    histogram!("mesh_dns.refresh.duration.seconds").record(duration.as_secs_f64());
}

/// Refresh attempt result, for metrics.
#[derive(Debug, Clone, Copy)]
pub enum RefreshOutcome {
    /// A fresh table was published.
    Success,
    /// The attempt failed; the previous table keeps serving.
    Failure,
}

/// Record current store sizes (call after each publish).
pub fn record_store_size(hosts: usize, suffixes: usize) {
    gauge!("mesh_dns.store.hosts.count").set(hosts as f64);
    gauge!("mesh_dns.store.suffixes.count").set(suffixes as f64);
}

/// Record a query observation dropped on a full channel.
pub fn record_observation_dropped() {
    counter!("mesh_dns.observation.dropped.count").increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
