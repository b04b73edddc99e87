//! Application logic and its optional processing phases.
//!
//! A [`Logic`] implementation always provides [`Logic::process`]. It may
//! additionally opt in to any of the optional phases by implementing the
//! phase's trait and returning `Some(self)` from the matching accessor:
//!
//! | Phase | Trait | Accessor |
//! |---|---|---|
//! | Unmarshal-target selection | [`UnmarshalTarget`] | [`Logic::as_unmarshal_target`] |
//! | Pre-validate | [`PreValidator`] | [`Logic::as_pre_validator`] |
//! | Validate | [`Validator`] | [`Logic::as_validator`] |
//! | Post-process | [`PostProcessor`] | [`Logic::as_post_processor`] |
//!
//! The accessors are consulted once when the handler is built and the result is
//! kept as a [`PhaseCapabilities`] descriptor.
//!
//! # Example
//!
//! ```rust,ignore
//! struct CreateAlbum;
//!
//! impl Logic for CreateAlbum {
//!     type Body = NewAlbum;
//!
//!     async fn process(&self, ctx: &RequestContext, request: &mut WsRequest<NewAlbum>, response: &mut WsResponse) {
//!         // ...
//!     }
//!
//!     fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<NewAlbum>> {
//!         Some(self)
//!     }
//! }
//!
//! impl UnmarshalTarget<NewAlbum> for CreateAlbum {
//!     fn unmarshal_target(&self, _ctx: &RequestContext) -> NewAlbum {
//!         NewAlbum::default()
//!     }
//! }
//! ```

use crate::request::WsRequest;
use crate::response::WsResponse;
use hypatia_core::{RequestContext, ServiceErrors};
use std::future::Future;

/// The application logic behind a web service endpoint.
pub trait Logic: Send + Sync + 'static {
    /// The type the request body is unmarshalled and bound into.
    type Body: Send + 'static;

    /// Processes a request that has passed every earlier phase.
    ///
    /// Failures are reported by recording errors on `response`.
    fn process(
        &self,
        ctx: &RequestContext,
        request: &mut WsRequest<Self::Body>,
        response: &mut WsResponse,
    ) -> impl Future<Output = ()> + Send;

    /// Returns the unmarshal-target phase, if supported.
    fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<Self::Body>> {
        None
    }

    /// Returns the pre-validate phase, if supported.
    fn as_pre_validator(&self) -> Option<&dyn PreValidator<Self::Body>> {
        None
    }

    /// Returns the validate phase, if supported.
    fn as_validator(&self) -> Option<&dyn Validator<Self::Body>> {
        None
    }

    /// Returns the post-process phase, if supported.
    fn as_post_processor(&self) -> Option<&dyn PostProcessor<Self::Body>> {
        None
    }
}

/// Supplies the value the request body is unmarshalled into.
///
/// Without this phase a request has no body and no parameters are bound.
pub trait UnmarshalTarget<B>: Send + Sync {
    /// Returns a fresh target for one request.
    fn unmarshal_target(&self, ctx: &RequestContext) -> B;
}

/// Inspects or adjusts a request before validation.
pub trait PreValidator<B>: Send + Sync {
    /// Returns `false` to stop processing; the request is then answered with
    /// whatever errors were recorded.
    ///
    /// Stopping without recording an error produces an empty `200` response,
    /// so a veto should normally record at least one error.
    fn pre_validate(
        &self,
        ctx: &RequestContext,
        request: &mut WsRequest<B>,
        errors: &mut ServiceErrors,
    ) -> bool;
}

/// Validates a request. Any recorded error prevents processing.
pub trait Validator<B>: Send + Sync {
    /// Records validation failures in `errors`.
    fn validate(&self, ctx: &RequestContext, errors: &mut ServiceErrors, request: &WsRequest<B>);
}

/// Runs after processing, including when validation or processing failed.
pub trait PostProcessor<B>: Send + Sync {
    /// Observes or adjusts the final response.
    fn post_process(
        &self,
        ctx: &RequestContext,
        handler_name: &str,
        request: &WsRequest<B>,
        response: &mut WsResponse,
    );
}

/// The optional phases a [`Logic`] implementation supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCapabilities {
    /// The logic supplies an unmarshal target.
    pub unmarshal_target: bool,
    /// The logic has a pre-validate phase.
    pub pre_validate: bool,
    /// The logic has a validate phase.
    pub validate: bool,
    /// The logic has a post-process phase.
    pub post_process: bool,
}

impl PhaseCapabilities {
    /// Detects the phases `logic` supports.
    #[must_use]
    pub fn detect<L: Logic>(logic: &L) -> Self {
        Self {
            unmarshal_target: logic.as_unmarshal_target().is_some(),
            pre_validate: logic.as_pre_validator().is_some(),
            validate: logic.as_validator().is_some(),
            post_process: logic.as_post_processor().is_some(),
        }
    }
}
