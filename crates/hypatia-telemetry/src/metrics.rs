//! Prometheus metrics for Hypatia web services.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hypatia_requests_total` | Counter | `handler`, `outcome`, `status` | Completed requests |
//! | `hypatia_request_duration_seconds` | Histogram | `handler` | Request latency |
//! | `hypatia_in_flight_requests` | Gauge | - | Requests being processed |
//! | `hypatia_validation_failures_total` | Counter | `handler` | Requests rejected by validation |
//!
//! The recording functions are safe to call before [`init_metrics`]; without
//! an installed recorder they do nothing.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "hypatia_requests_total";
/// Request duration histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "hypatia_request_duration_seconds";
/// In-flight gauge name.
pub const IN_FLIGHT_REQUESTS: &str = "hypatia_in_flight_requests";
/// Validation failure counter name.
pub const VALIDATION_FAILURES_TOTAL: &str = "hypatia_validation_failures_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            // 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Parses the listener address.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidAddress`] if `addr` is not a socket address.
    pub fn socket_addr(&self) -> TelemetryResult<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", self.addr)))
    }
}

/// Installs the Prometheus exporter and its HTTP listener.
///
/// Does nothing when metrics are disabled.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidAddress`] for a bad address and
/// [`TelemetryError::MetricsInit`] if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = config.socket_addr()?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of web service requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "Web service request duration in seconds");
    describe_gauge!(IN_FLIGHT_REQUESTS, "Number of web service requests being processed");
    describe_counter!(
        VALIDATION_FAILURES_TOTAL,
        "Requests rejected during the validate phase"
    );
}

/// Records a completed request.
///
/// `outcome` is the lowercase outcome name (`normal`, `error`, `abnormal`).
pub fn record_request(handler: &str, outcome: &'static str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "handler" => handler.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "handler" => handler.to_string())
        .record(duration.as_secs_f64());
}

/// Records a request rejected by validation.
pub fn record_validation_failure(handler: &str) {
    counter!(VALIDATION_FAILURES_TOTAL, "handler" => handler.to_string()).increment(1);
}

/// Guard that counts a request as in flight until dropped.
///
/// Dropping on unwind keeps the gauge accurate when a request panics.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
