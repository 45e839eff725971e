//! Metrics instrumentation for dns-failover.
//!
//! All metrics are prefixed with `dns_failover.`

use metrics::{counter, histogram};
use std::time::Instant;

/// Record an inbound event and whether it decoded.
pub fn record_event(outcome: EventOutcome) {
    let outcome_str = match outcome {
        EventOutcome::Parsed => "parsed",
        EventOutcome::Malformed => "malformed",
    };

    counter!("dns_failover.event.count", "outcome" => outcome_str).increment(1);
}

/// Inbound event outcome.
#[derive(Debug, Clone, Copy)]
pub enum EventOutcome {
    /// Envelope decoded into an alarm event.
    Parsed,
    /// Envelope or alarm payload could not be decoded.
    Malformed,
}

/// Record a health query against the metrics backend.
pub fn record_health_query(region: &str, result: HealthQueryResult, duration: std::time::Duration) {
    let result_str = match result {
        HealthQueryResult::Sample => "sample",
        HealthQueryResult::NoData => "no_data",
        HealthQueryResult::Error => "error",
    };

    counter!("dns_failover.health.query.count", "region" => region.to_string(), "result" => result_str)
        .increment(1);
    histogram!("dns_failover.health.query.duration.seconds", "region" => region.to_string())
        .record(duration.as_secs_f64());
}

/// Health query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum HealthQueryResult {
    /// At least one datapoint was returned.
    Sample,
    /// The window held no datapoints.
    NoData,
    /// The query failed.
    Error,
}

/// Record a record-pair publish.
pub fn record_publish(primary_is_first_region: bool, success: bool, duration: std::time::Duration) {
    let target = if primary_is_first_region {
        "primary"
    } else {
        "secondary"
    };
    let result = if success { "success" } else { "error" };

    counter!("dns_failover.publish.count", "target" => target, "result" => result).increment(1);
    histogram!("dns_failover.publish.duration.seconds", "target" => target)
        .record(duration.as_secs_f64());
}

/// Record the engine's decision for one event.
pub fn record_decision(kind: &'static str) {
    counter!("dns_failover.decision.count", "kind" => kind).increment(1);
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
