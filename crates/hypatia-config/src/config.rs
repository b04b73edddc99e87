//! Configuration types.
//!
//! This module provides the top-level [`WsFacilityConfig`] struct, its
//! sections and its builder.

use std::collections::{BTreeMap, HashSet};

use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use hypatia_core::{FrameworkErrorEvent, FrameworkMessage, ServiceErrorDefinition};
use hypatia_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Complete configuration of the web service facility.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use hypatia_config::{WrapMode, WsFacilityConfig};
///
/// let config = WsFacilityConfig::default();
/// assert_eq!(config.response_writer.wrap_mode, WrapMode::Wrap);
/// assert_eq!(config.response_writer.wrapper.body_field, "response");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WsFacilityConfig {
    /// How responses are rendered.
    #[serde(default)]
    pub response_writer: ResponseWriterConfig,

    /// Messages for framework errors and HTTP statuses.
    #[serde(default)]
    pub framework_errors: FrameworkErrorsConfig,

    /// Predefined service errors, looked up by code.
    #[serde(default)]
    pub service_errors: Vec<ServiceErrorDefinition>,

    /// Defaults applied to every handler built by the facility.
    #[serde(default)]
    pub handler: HandlerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Response rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseWriterConfig {
    /// Headers added to every response unless the response sets them.
    pub default_headers: BTreeMap<String, String>,

    /// How body and errors are combined.
    pub wrap_mode: WrapMode,

    /// Field names used by [`WrapMode::Wrap`].
    pub wrapper: WrapperConfig,

    /// JSON output settings.
    pub marshal: MarshalConfig,
}

/// How a response body and its errors are combined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    /// `{"response": body, "errors": errors}`, omitting absent parts.
    #[default]
    Wrap,
    /// The errors if there are any, otherwise the bare body.
    Body,
}

/// Field names for the wrapping structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WrapperConfig {
    /// Name of the field holding the body.
    pub body_field: String,

    /// Name of the field holding the errors.
    pub errors_field: String,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            body_field: "response".to_string(),
            errors_field: "errors".to_string(),
        }
    }
}

/// JSON output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MarshalConfig {
    /// Indent output over multiple lines.
    pub pretty_print: bool,

    /// The indent used when pretty printing.
    pub indent: String,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            pretty_print: false,
            indent: "  ".to_string(),
        }
    }
}

/// Framework error messages.
///
/// Events without an entry keep their built-in message.
///
/// ```toml
/// [framework_errors.messages]
/// query_wrong_type = ["BAD_PARAM", "{} must be {}"]
///
/// [framework_errors.http_messages]
/// 404 = "Nothing here"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FrameworkErrorsConfig {
    /// Code and message template per event.
    pub messages: BTreeMap<FrameworkErrorEvent, FrameworkMessage>,

    /// Message per HTTP status, keyed by the status number.
    pub http_messages: BTreeMap<String, String>,
}

impl FrameworkErrorsConfig {
    /// Parses the keys of [`http_messages`](Self::http_messages).
    ///
    /// # Errors
    ///
    /// Returns an error for a key that is not an HTTP status.
    pub fn http_statuses(&self) -> Result<Vec<(StatusCode, &str)>, ConfigError> {
        self.http_messages
            .iter()
            .map(|(key, message)| {
                key.trim()
                    .parse::<u16>()
                    .ok()
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .map(|status| (status, message.as_str()))
                    .ok_or_else(|| {
                        ConfigError::invalid_value(
                            format!("framework_errors.http_messages.{key}"),
                            "not an HTTP status code",
                        )
                    })
            })
            .collect()
    }
}

/// Handler defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Bind query parameters to body fields of the same name.
    pub auto_bind_query: bool,

    /// Reject callers that are not authenticated.
    pub require_authentication: bool,
}

impl WsFacilityConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> WsFacilityConfigBuilder {
        WsFacilityConfigBuilder::new()
    }

    /// Create a development configuration preset: human-readable logs at
    /// debug level and pretty-printed JSON.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::development();
        config.response_writer.marshal.pretty_print = true;
        config
    }

    /// Create a production configuration preset: JSON logs at info level
    /// and compact JSON.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::production();
        config.response_writer.marshal.pretty_print = false;
        config
    }

    /// Returns the logging and metrics sections as a telemetry configuration.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            logging: self.logging.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::ValidationError`
    /// if:
    /// - a default header name or value is not valid HTTP
    /// - a wrapper field name is empty, or both names are the same
    /// - the marshal indent contains anything but whitespace
    /// - an HTTP message key is not a status code
    /// - a service error code is empty or defined twice
    /// - a log level is unknown, or the metrics address is invalid while
    ///   metrics are enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in &self.response_writer.default_headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid_value(
                    format!("response_writer.default_headers.{name}"),
                    "invalid header name",
                ));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::invalid_value(
                    format!("response_writer.default_headers.{name}"),
                    "invalid header value",
                ));
            }
        }

        let wrapper = &self.response_writer.wrapper;
        if wrapper.body_field.is_empty() {
            return Err(ConfigError::invalid_value(
                "response_writer.wrapper.body_field",
                "must not be empty",
            ));
        }
        if wrapper.errors_field.is_empty() {
            return Err(ConfigError::invalid_value(
                "response_writer.wrapper.errors_field",
                "must not be empty",
            ));
        }
        if wrapper.body_field == wrapper.errors_field {
            return Err(ConfigError::validation_error(
                "response_writer.wrapper.body_field and errors_field must differ",
            ));
        }

        if !self
            .response_writer
            .marshal
            .indent
            .chars()
            .all(char::is_whitespace)
        {
            return Err(ConfigError::invalid_value(
                "response_writer.marshal.indent",
                "must contain only whitespace",
            ));
        }

        self.framework_errors.http_statuses()?;

        let mut codes = HashSet::with_capacity(self.service_errors.len());
        for definition in &self.service_errors {
            if definition.code.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "service_errors.code",
                    "must not be empty",
                ));
            }
            if !codes.insert(definition.code.as_str()) {
                return Err(ConfigError::validation_error(format!(
                    "service error code '{}' is defined more than once",
                    definition.code
                )));
            }
        }

        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging", e.to_string()))?;

        if self.metrics.enabled {
            self.metrics
                .socket_addr()
                .map_err(|e| ConfigError::invalid_value("metrics.addr", e.to_string()))?;
        }

        Ok(())
    }
}

/// Builder for [`WsFacilityConfig`].
#[derive(Debug, Default)]
pub struct WsFacilityConfigBuilder {
    config: WsFacilityConfig,
}

impl WsFacilityConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response writer section.
    #[must_use]
    pub fn response_writer(mut self, section: ResponseWriterConfig) -> Self {
        self.config.response_writer = section;
        self
    }

    /// Add a default response header.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .response_writer
            .default_headers
            .insert(name.into(), value.into());
        self
    }

    /// Set the wrap mode.
    #[must_use]
    pub fn wrap_mode(mut self, mode: WrapMode) -> Self {
        self.config.response_writer.wrap_mode = mode;
        self
    }

    /// Set the framework errors section.
    #[must_use]
    pub fn framework_errors(mut self, section: FrameworkErrorsConfig) -> Self {
        self.config.framework_errors = section;
        self
    }

    /// Add a predefined service error.
    #[must_use]
    pub fn service_error(mut self, definition: ServiceErrorDefinition) -> Self {
        self.config.service_errors.push(definition);
        self
    }

    /// Set the handler defaults.
    #[must_use]
    pub fn handler(mut self, section: HandlerConfig) -> Self {
        self.config.handler = section;
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Set the metrics configuration.
    #[must_use]
    pub fn metrics(mut self, config: MetricsConfig) -> Self {
        self.config.metrics = config;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> WsFacilityConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypatia_core::ServiceErrorCategory;

    fn definition(code: &str) -> ServiceErrorDefinition {
        ServiceErrorDefinition {
            category: ServiceErrorCategory::Client,
            code: code.to_string(),
            message: "message".to_string(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(WsFacilityConfig::default().validate().is_ok());
        assert!(WsFacilityConfig::development().validate().is_ok());
        assert!(WsFacilityConfig::production().validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = WsFacilityConfig::development();
        assert_eq!(dev.logging.level, "debug");
        assert!(dev.response_writer.marshal.pretty_print);

        let prod = WsFacilityConfig::production();
        assert!(prod.logging.json_format);
        assert!(!prod.response_writer.marshal.pretty_print);
    }

    #[test]
    fn test_builder() {
        let config = WsFacilityConfig::builder()
            .default_header("Cache-Control", "no-store")
            .wrap_mode(WrapMode::Body)
            .service_error(definition("NO_TITLE"))
            .handler(HandlerConfig {
                auto_bind_query: true,
                require_authentication: false,
            })
            .build();

        assert_eq!(config.response_writer.default_headers["Cache-Control"], "no-store");
        assert_eq!(config.response_writer.wrap_mode, WrapMode::Body);
        assert_eq!(config.service_errors.len(), 1);
        assert!(config.handler.auto_bind_query);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = WsFacilityConfig::builder()
            .default_header("bad header", "x")
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_wrapper_fields_must_differ() {
        let mut config = WsFacilityConfig::default();
        config.response_writer.wrapper.errors_field = "response".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_indent_must_be_whitespace() {
        let mut config = WsFacilityConfig::default();
        config.response_writer.marshal.indent = "--".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_message_keys_must_be_statuses() {
        let mut config = WsFacilityConfig::default();
        config
            .framework_errors
            .http_messages
            .insert("404".to_string(), "Nothing here".to_string());
        assert_eq!(
            config.framework_errors.http_statuses().unwrap(),
            vec![(StatusCode::NOT_FOUND, "Nothing here")]
        );

        config
            .framework_errors
            .http_messages
            .insert("teapot".to_string(), "I'm a teapot".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_service_error_codes_rejected() {
        let config = WsFacilityConfig::builder()
            .service_error(definition("DUP"))
            .service_error(definition("DUP"))
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = WsFacilityConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = WsFacilityConfig::default();
        config.metrics.addr = "not an address".to_string();
        assert!(config.validate().is_ok());

        config.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telemetry_section() {
        let config = WsFacilityConfig::development();
        let telemetry = config.telemetry();
        assert_eq!(telemetry.logging, config.logging);
        assert_eq!(telemetry.metrics, config.metrics);
    }
}
