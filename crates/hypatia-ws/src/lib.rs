//! # Hypatia WS
//!
//! Request processing and response writing for web service endpoints.
//!
//! A [`WsHandler`] wraps application [`Logic`] and takes each HTTP request
//! through a fixed sequence of phases (identification, access checking,
//! body parsing, parameter binding, validation, processing and
//! post-processing), then hands the result to a [`ResponseWriter`] exactly
//! once.
//!
//! ## Outcomes
//!
//! | Outcome | Meaning | Rendered as |
//! |---|---|---|
//! | [`WsOutcome::Normal`] | Process ran and recorded no errors | the response body and headers |
//! | [`WsOutcome::Error`] | errors were recorded at any phase | the errors only |
//! | [`WsOutcome::Abnormal`] | processing failed unexpectedly | a bare 5xx status |
//!
//! The status of `Normal` and `Error` responses is chosen by a
//! [`HttpStatusCodeDeterminer`]; see [`DefaultStatusDeterminer`] for the
//! standard rules.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hypatia_ws::{HttpResponseWriter, Logic, WsHandler, WsRequest, WsResponse};
//!
//! struct Ping;
//!
//! impl Logic for Ping {
//!     type Body = ();
//!
//!     async fn process(&self, _ctx: &RequestContext, _req: &mut WsRequest<()>, res: &mut WsResponse) {
//!         res.set_body(serde_json::json!("pong"));
//!     }
//! }
//!
//! let handler = WsHandler::builder("ping", Ping).build()?;
//! let mut sink = HttpResponseWriter::new();
//! handler.serve(RequestContext::new(), &mut sink, request).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/hypatia-ws/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod error;
mod handler;
mod iam;
mod json;
mod logic;
mod request;
mod response;
mod sink;
mod status;
mod unmarshal;
mod writer;

pub use binder::{BindFn, ParamBinder};
pub use error::{HandlerBuildError, WriteError};
pub use handler::{WsHandler, WsHandlerBuilder, UNAUTHENTICATED_CODE};
pub use iam::{AccessChecker, Identifier};
pub use json::{
    BodyOrErrorWrapper, JsonErrorFormatter, JsonMarshalingWriter, JsonResponseWrapper,
    JSON_CONTENT_TYPE,
};
pub use logic::{Logic, PhaseCapabilities, PostProcessor, PreValidator, UnmarshalTarget, Validator};
pub use request::{RequestHead, WsRequest};
pub use response::{WsOutcome, WsProcessState, WsResponse};
pub use sink::HttpResponseWriter;
pub use status::{DefaultStatusDeterminer, HttpStatusCodeDeterminer};
pub use unmarshal::{JsonUnmarshaller, UnmarshalError, Unmarshaller};
pub use writer::{
    merge_headers, AbnormalStatusWriter, CommonResponseHeaderBuilder, ErrorFormatter,
    MarshalingWriter, MarshallingResponseWriter, MarshallingResponseWriterBuilder, ResponseWrapper,
    ResponseWriter,
};
