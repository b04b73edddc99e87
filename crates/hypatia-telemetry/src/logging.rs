//! Structured logging for Hypatia services.
//!
//! Every Hypatia component logs through `tracing` under a stable target
//! (`hypatia::ws::handler`, `hypatia::ws::writer`, `hypatia::validate`, ...).
//! A [`LogConfig`] sets a global level and, optionally, a level per target,
//! so a single noisy component can be turned up without flooding the logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use hypatia_telemetry::logging::{init_logging, LogConfig};
//!
//! let mut config = LogConfig::production();
//! config
//!     .component_levels
//!     .insert("hypatia::validate".to_string(), "debug".to_string());
//! init_logging(&config)?;
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Global log level (e.g., "info", "debug", "warn").
    pub level: String,

    /// Per-component levels, keyed by tracing target.
    pub component_levels: BTreeMap<String, String>,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (enter, exit, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            component_levels: BTreeMap::new(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            component_levels: BTreeMap::new(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }

    /// Sets the level for one component.
    #[must_use]
    pub fn with_component_level(mut self, component: impl Into<String>, level: impl Into<String>) -> Self {
        self.component_levels.insert(component.into(), level.into());
        self
    }

    /// Returns the filter directives for this configuration.
    ///
    /// The global level comes first, followed by one `target=level`
    /// directive per component in name order.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidLevel`] if any level is not a
    /// recognised tracing level.
    pub fn filter_directives(&self) -> TelemetryResult<String> {
        let mut directives = vec![parse_level("*", &self.level)?];
        for (component, level) in &self.component_levels {
            let level = parse_level(component, level)?;
            directives.push(format!("{component}={level}"));
        }
        Ok(directives.join(","))
    }

    /// Validates the configured levels.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidLevel`] for the first bad level.
    pub fn validate(&self) -> TelemetryResult<()> {
        self.filter_directives().map(|_| ())
    }
}

/// Parses `level`, returning it in the lowercase form filter directives use.
fn parse_level(component: &str, level: &str) -> TelemetryResult<String> {
    LevelFilter::from_str(level.trim())
        .map(|l| l.to_string().to_ascii_lowercase())
        .map_err(|_| TelemetryError::InvalidLevel {
            component: component.to_string(),
            level: level.to_string(),
        })
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] for a bad level and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.filter_directives()?)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] if the directives are invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Standard log field names.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// Handler name field name.
    pub const HANDLER: &str = "handler";

    /// Request outcome field name.
    pub const OUTCOME: &str = "outcome";

    /// HTTP status field name.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Loggable user ID field name.
    pub const USER_ID: &str = "user_id";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
        assert!(config.component_levels.is_empty());
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_filter_directives_include_components() {
        let config = LogConfig::production()
            .with_component_level("hypatia::ws::writer", "trace")
            .with_component_level("hypatia::validate", "WARN");

        assert_eq!(
            config.filter_directives().unwrap(),
            "info,hypatia::validate=warn,hypatia::ws::writer=trace"
        );
        assert!(create_env_filter(&config.filter_directives().unwrap()).is_ok());
    }

    #[test]
    fn test_invalid_component_level() {
        let config = LogConfig::production().with_component_level("hypatia::ws", "chatty");
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::InvalidLevel { ref component, .. } if component == "hypatia::ws"
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LogConfig = serde_json::from_str(
            r#"{"level": "warn", "component_levels": {"hypatia::ws::handler": "debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.level, "warn");
        assert!(config.json_format);
        assert_eq!(
            config.component_levels.get("hypatia::ws::handler").map(String::as_str),
            Some("debug")
        );
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
