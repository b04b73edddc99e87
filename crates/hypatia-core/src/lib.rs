//! # Hypatia Core
//!
//! Core types shared by every stage of the Hypatia web-service pipeline.
//!
//! - [`CategorisedError`] / [`ServiceErrors`] - Categorised service errors and their ordered collection
//! - [`ServiceErrorFinder`] / [`ServiceErrorManager`] - Resolution of error codes to predefined errors
//! - [`WsFrameworkError`] / [`FrameworkErrorGenerator`] - Errors raised before application logic runs
//! - [`ClientIdentity`] - Information about the caller of a web service
//! - [`RequestContext`] - Per-request context carrying the request ID and timing
//! - [`WsParams`] - Query and path parameters with typed accessors
//! - [`Subject`] / [`ParamTarget`] - Compile-time field descriptors used by validation and binding

#![doc(html_root_url = "https://docs.rs/hypatia-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bind;
mod context;
mod error;
mod framework;
mod identity;
mod params;
pub mod subject;

pub use bind::{BindError, BindParam, ParamTarget};
pub use context::{RequestContext, RequestId};
pub use error::{
    CategorisedError, CoreError, ServiceErrorCategory, ServiceErrorDefinition, ServiceErrorFinder,
    ServiceErrorManager, ServiceErrorManagerBuilder, ServiceErrors, UNKNOWN_ERROR_CODE,
};
pub use framework::{
    FrameworkErrorEvent, FrameworkErrorGenerator, FrameworkMessage, FrameworkPhase,
    WsFrameworkError,
};
pub use identity::ClientIdentity;
pub use params::{ParamError, WsParams};
pub use subject::{FieldKind, FieldPath, FieldValue, Segment, Subject, SubjectField};
