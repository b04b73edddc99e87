//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, strings and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, WrapMode, WsFacilityConfig};

/// Default prefix for environment variable overrides.
pub const DEFAULT_ENV_PREFIX: &str = "HYPATIA";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones key by key:
/// 1. Default values (built into the code)
/// 2. Configuration files (TOML or JSON)
/// 3. Configuration strings
/// 4. Environment variables
///
/// # Example
///
/// ```no_run
/// use hypatia_config::ConfigLoader;
///
/// # fn main() -> Result<(), hypatia_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("ws.toml")?
///     .with_env_prefix("HYPATIA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: WsFacilityConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WsFacilityConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = WsFacilityConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use hypatia_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = WsFacilityConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = WsFacilityConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats.
    /// The file format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let layer = Self::parse_file(&content, path)?;
        self.merge_layer(layer)?;
        self.file_loaded = true;

        tracing::debug!(target: "hypatia::config", path = %path.display(), "Loaded configuration file");
        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - File format ("toml" or "json")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use hypatia_config::{ConfigLoader, WrapMode};
    ///
    /// let toml = r#"
    ///     [response_writer]
    ///     wrap_mode = "body"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.response_writer.wrap_mode, WrapMode::Body);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = match format.to_lowercase().as_str() {
            "toml" => Self::parse_toml(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };

        self.merge_layer(layer)?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "HYPATIA":
    /// - `HYPATIA__RESPONSE_WRITER__WRAP_MODE=body`
    /// - `HYPATIA__HANDLER__AUTO_BIND_QUERY=true`
    /// - `HYPATIA__RESPONSE_WRITER__DEFAULT_HEADERS__CACHE_CONTROL=no-store`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file for environment variables.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!("failed to load .env: {e}"))),
        }
    }

    /// Returns `true` if a configuration file was loaded.
    #[must_use]
    pub const fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<WsFacilityConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> WsFacilityConfig {
        self.config
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<Value, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Self::parse_toml(content),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn parse_toml(content: &str) -> Result<Value, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        Ok(serde_json::to_value(table)?)
    }

    // Overlay a parsed layer onto the current configuration
    fn merge_layer(&mut self, layer: Value) -> Result<(), ConfigError> {
        let mut merged = serde_json::to_value(&self.config)?;
        merge_values(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(())
    }

    // Apply environment variable overrides
    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    // Apply a single environment variable
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let writer = &mut self.config.response_writer;

        match parts.as_slice() {
            // Response writer section
            ["RESPONSE_WRITER", "WRAP_MODE"] => {
                writer.wrap_mode = match value.to_lowercase().as_str() {
                    "wrap" => WrapMode::Wrap,
                    "body" => WrapMode::Body,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'wrap' or 'body'")),
                };
            }
            ["RESPONSE_WRITER", "WRAPPER", "BODY_FIELD"] => {
                writer.wrapper.body_field = value.to_string();
            }
            ["RESPONSE_WRITER", "WRAPPER", "ERRORS_FIELD"] => {
                writer.wrapper.errors_field = value.to_string();
            }
            ["RESPONSE_WRITER", "MARSHAL", "PRETTY_PRINT"] => {
                writer.marshal.pretty_print = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["RESPONSE_WRITER", "MARSHAL", "INDENT"] => {
                writer.marshal.indent = value.to_string();
            }
            ["RESPONSE_WRITER", "DEFAULT_HEADERS", name] => {
                let header = name.to_ascii_lowercase().replace('_', "-");
                writer.default_headers.insert(header, value.to_string());
            }

            // Handler section
            ["HANDLER", "AUTO_BIND_QUERY"] => {
                self.config.handler.auto_bind_query = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["HANDLER", "REQUIRE_AUTHENTICATION"] => {
                self.config.handler.require_authentication = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            // Logging section
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "JSON_FORMAT"] => {
                self.config.logging.json_format = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            // Metrics section
            ["METRICS", "ENABLED"] => {
                self.config.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["METRICS", "ADDR"] => {
                self.config.metrics.addr = value.to_string();
            }

            _ => {
                tracing::warn!(target: "hypatia::config", var = key, "Ignoring unknown configuration variable");
            }
        }

        Ok(())
    }
}

/// Overlays `layer` onto `base`: objects merge key by key, anything else
/// replaces the base value.
fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, WsFacilityConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.response_writer.marshal.pretty_print);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [handler]
            auto_bind_query = true
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert!(config.handler.auto_bind_query);
        assert_eq!(config.response_writer.wrapper.body_field, "response");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"response_writer": {"wrapper": {"body_field": "data"}}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.response_writer.wrapper.body_field, "data");
        assert_eq!(config.response_writer.wrapper.errors_field, "errors");
    }

    #[test]
    fn test_layers_merge_key_by_key() {
        let config = ConfigLoader::new()
            .with_development()
            .with_string("[handler]\nrequire_authentication = true", "toml")
            .unwrap()
            .with_string(r#"{"handler": {"auto_bind_query": true}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        assert!(config.handler.require_authentication);
        assert!(config.handler.auto_bind_query);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::new().with_string("[handler]\nretries = 3", "toml");
        assert!(matches!(result, Err(ConfigError::JsonError(_))));

        let result = ConfigLoader::new().with_string("[server]\nport = 1", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_wrap_mode_rejected() {
        let result = ConfigLoader::new().with_string("[response_writer]\nwrap_mode = \"xml\"", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("a: b", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/ws.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/ws.toml")
            .unwrap();
        assert!(!loader.file_loaded());
        assert_eq!(loader.load().unwrap(), WsFacilityConfig::default());
    }

    #[test]
    fn test_merge_values() {
        let mut base = json!({"a": {"b": 1, "c": [1, 2]}, "d": "x"});
        merge_values(&mut base, json!({"a": {"c": [3]}, "e": true}));
        assert_eq!(base, json!({"a": {"b": 1, "c": [3]}, "d": "x", "e": true}));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    // Environment overrides are exercised through apply_env_var directly;
    // mutating the process environment is not thread-safe under the test
    // harness.

    #[test]
    fn test_apply_env_var_response_writer() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__RESPONSE_WRITER__WRAP_MODE", "body", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__RESPONSE_WRITER__WRAPPER__ERRORS_FIELD", "problems", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__RESPONSE_WRITER__DEFAULT_HEADERS__CACHE_CONTROL", "no-store", "TEST")
            .unwrap();

        let writer = &loader.config.response_writer;
        assert_eq!(writer.wrap_mode, WrapMode::Body);
        assert_eq!(writer.wrapper.errors_field, "problems");
        assert_eq!(writer.default_headers["cache-control"], "no-store");
    }

    #[test]
    fn test_apply_env_var_handler_and_telemetry() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__HANDLER__REQUIRE_AUTHENTICATION", "yes", "TEST")
            .unwrap();
        loader.apply_env_var("TEST__LOGGING__LEVEL", "warn", "TEST").unwrap();
        loader.apply_env_var("TEST__METRICS__ENABLED", "true", "TEST").unwrap();

        assert!(loader.config.handler.require_authentication);
        assert_eq!(loader.config.logging.level, "warn");
        assert!(loader.config.metrics.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__HANDLER__AUTO_BIND_QUERY", "sometimes", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__RESPONSE_WRITER__WRAP_MODE", "xml", "TEST")
            .is_err());
        assert!(loader.apply_env_var("TESTX", "1", "TEST").is_err());
    }
}
