//! # Hypatia
//!
//! **Validated, declaratively rendered web service endpoints**
//!
//! Hypatia takes an HTTP request through a fixed processing pipeline and
//! renders exactly one response:
//!
//! - **Declarative validation** – per-field rules such as
//!   `["title", "REQ:NO_TITLE", "LEN:1-200"]`, parsed once at startup
//! - **Capability-driven logic** – endpoints opt in to pre-validation,
//!   validation and post-processing by implementing small traits
//! - **Categorised errors** – every failure maps deterministically to an
//!   HTTP status
//! - **Configurable rendering** – wrapped or bare JSON, default headers and
//!   framework messages loaded from TOML, JSON or the environment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hypatia::prelude::*;
//!
//! #[derive(Default, serde::Deserialize, Subject)]
//! struct NewAlbum {
//!     title: String,
//!     year: u32,
//! }
//!
//! struct CreateAlbum;
//!
//! impl Logic for CreateAlbum {
//!     type Body = NewAlbum;
//!
//!     async fn process(&self, _ctx: &RequestContext, req: &mut WsRequest<NewAlbum>, res: &mut WsResponse) {
//!         // ...
//!     }
//!
//!     fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<NewAlbum>> {
//!         Some(self)
//!     }
//! }
//!
//! let config = ConfigLoader::new().with_optional_file("ws.toml")?.with_env_prefix("HYPATIA").load()?;
//! let facility = WsFacility::from_config(&config)?;
//! let rules = ValidatorBuilder::new("INVALID")
//!     .build::<NewAlbum>(&[FieldRule::new("title", ["REQ:NO_TITLE"])])?;
//! let handler = facility.handler("create-album", CreateAlbum).json_body().validate_with(rules).build()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Identify → Access → UnmarshalTarget → Unmarshal → PathBind → QueryBind
//!                                                                  ↓
//! Write ← PostProcess ← Process ← Validate ← PreValidate ←─────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/hypatia/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use hypatia_core as core;

// Re-export validation
pub use hypatia_validate as validate;

// Re-export request processing and response writing
pub use hypatia_ws as ws;

// Re-export telemetry
pub use hypatia_telemetry as telemetry;

// Re-export configuration
pub use hypatia_config as config;

// Re-export derive macros
pub use hypatia_macros::{ParamTarget, Subject};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use hypatia::prelude::*;
/// ```
pub mod prelude {
    pub use hypatia_core::{
        CategorisedError, ClientIdentity, ParamTarget, RequestContext, RequestId,
        ServiceErrorCategory, ServiceErrorFinder, ServiceErrorManager, ServiceErrors, Subject,
    };

    // Re-export derive macros
    pub use hypatia_macros::{ParamTarget, Subject};

    // Re-export validation types
    pub use hypatia_validate::{
        CheckContext, CheckerRegistry, FieldRule, FnChecker, RuleValidator, ValidatorBuilder,
    };

    // Re-export handler types
    pub use hypatia_ws::{
        AccessChecker, HttpResponseWriter, Identifier, Logic, PostProcessor, PreValidator,
        UnmarshalTarget, Validator, WsHandler, WsOutcome, WsRequest, WsResponse,
    };

    // Re-export configuration types
    pub use hypatia_config::{ConfigError, ConfigLoader, WsFacility, WsFacilityConfig};
}
