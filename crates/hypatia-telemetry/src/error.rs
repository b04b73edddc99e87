//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while initialising telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A log level or filter directive could not be parsed.
    #[error("Invalid log level for '{component}': {level}")]
    InvalidLevel {
        /// The component (tracing target) the level applies to, or `*` for the global level.
        component: String,
        /// The rejected level.
        level: String,
    },

    /// Failed to parse address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
