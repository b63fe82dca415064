//! Prometheus metrics for the wallet bridge.
//!
//! All metrics follow the naming convention: `wb_<area>_<metric>_<unit>`.
//! The `side` label is `host` or `wallet`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CHANNEL METRICS
    // =========================================================================

    /// Envelopes posted to the peer
    pub static ref ENVELOPES_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_channel_envelopes_sent_total", "Envelopes posted to the peer"),
        &["side", "operation"]
    ).expect("metric creation failed");

    /// Envelopes that passed validation
    pub static ref ENVELOPES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_channel_envelopes_received_total", "Envelopes accepted from the peer"),
        &["side", "operation"]
    ).expect("metric creation failed");

    // =========================================================================
    // VALIDATION METRICS
    // =========================================================================

    /// Rejections by stable label
    pub static ref VALIDATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_validation_failures_total", "Envelopes rejected by the validator"),
        &["side", "label"]  // label: nonce/timestamp/origin/...
    ).expect("metric creation failed");

    /// Anomaly breaker trips
    pub static ref ANOMALY_TRIPS: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_anomaly_trips_total", "Anomaly circuit breaker trips"),
        &["side"]
    ).expect("metric creation failed");

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Completed handshakes
    pub static ref HANDSHAKES_COMPLETED: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_session_handshakes_completed_total", "Handshakes completed"),
        &["side"]
    ).expect("metric creation failed");

    /// Failed handshake attempts (host)
    pub static ref HANDSHAKES_FAILED: IntCounter = IntCounter::new(
        "wb_session_handshakes_failed_total",
        "Handshake attempts that failed or were rejected"
    ).expect("metric creation failed");

    /// Sessions or connectors terminated by an error envelope
    pub static ref TERMINATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("wb_session_terminations_total", "Terminations requested by error envelopes"),
        &["side", "scope"]  // scope: session/full
    ).expect("metric creation failed");

    /// Connectors that failed permanently
    pub static ref CONNECTOR_FAILURES: IntCounter = IntCounter::new(
        "wb_connector_failures_total",
        "Connectors that exhausted their handshake retries"
    ).expect("metric creation failed");
}

/// Handle proving metrics were registered.
pub struct MetricsHandle {
    _registered: usize,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Channel
        Box::new(ENVELOPES_SENT.clone()),
        Box::new(ENVELOPES_RECEIVED.clone()),
        // Validation
        Box::new(VALIDATION_FAILURES.clone()),
        Box::new(ANOMALY_TRIPS.clone()),
        // Session
        Box::new(HANDSHAKES_COMPLETED.clone()),
        Box::new(HANDSHAKES_FAILED.clone()),
        Box::new(TERMINATIONS.clone()),
        Box::new(CONNECTOR_FAILURES.clone()),
    ];

    let count = metrics.len();
    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registered: count,
    })
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
