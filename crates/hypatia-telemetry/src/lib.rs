//! # Hypatia Telemetry
//!
//! Logging and metrics for Hypatia web services.
//!
//! - **Logging**: `tracing-subscriber` with JSON or pretty output and
//!   per-component levels keyed by tracing target
//! - **Metrics**: request counts, latency, in-flight requests and validation
//!   failures via the `metrics` crate, exported in Prometheus format
//!
//! # Example
//!
//! ```rust,ignore
//! use hypatia_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .logging(LogConfig::development())
//!     .metrics_addr("0.0.0.0:9090")
//!     .build();
//!
//! init_telemetry(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/hypatia-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and then metrics.
///
/// # Errors
///
/// Returns [`TelemetryError`] if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
