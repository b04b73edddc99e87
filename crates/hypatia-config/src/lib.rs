//! Layered configuration for the Hypatia web service facility.
//!
//! This crate loads a strongly-typed [`WsFacilityConfig`] from:
//! - TOML and JSON configuration files or strings
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → string → env)
//!
//! and turns it into a [`WsFacility`]: the error finder, framework error
//! generator and JSON response writer shared by every handler.
//!
//! # Example
//!
//! ```no_run
//! use hypatia_config::{ConfigLoader, WsFacility};
//!
//! # fn main() -> Result<(), hypatia_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("ws.toml")?
//!     .with_env_prefix("HYPATIA")
//!     .load()?;
//!
//! let facility = WsFacility::from_config(&config)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [response_writer]
//! wrap_mode = "wrap"
//!
//! [response_writer.default_headers]
//! cache-control = "no-store"
//!
//! [response_writer.wrapper]
//! body_field = "response"
//! errors_field = "errors"
//!
//! [response_writer.marshal]
//! pretty_print = false
//!
//! [framework_errors.messages]
//! unable_to_parse_request = ["UNPARSEABLE", "The request could not be read."]
//!
//! [framework_errors.http_messages]
//! 500 = "Something went wrong."
//!
//! [[service_errors]]
//! category = "C"
//! code = "NO_TITLE"
//! message = "A title is required."
//!
//! [handler]
//! auto_bind_query = true
//! require_authentication = false
//!
//! [logging]
//! level = "info"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `HYPATIA__RESPONSE_WRITER__WRAP_MODE=body`
//! - `HYPATIA__HANDLER__REQUIRE_AUTHENTICATION=true`
//! - `HYPATIA__METRICS__ENABLED=false`

#![doc(html_root_url = "https://docs.rs/hypatia-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod facility;
mod loader;

pub use config::*;
pub use error::ConfigError;
pub use facility::WsFacility;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
