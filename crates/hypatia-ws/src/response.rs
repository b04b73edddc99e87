//! Responses, outcomes and the per-request processing state.

use crate::request::RequestHead;
use crate::sink::HttpResponseWriter;
use hypatia_core::{ClientIdentity, ServiceErrorFinder, ServiceErrors};
use http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The format-neutral result of processing a request.
///
/// The body is held as a [`serde_json::Value`] so that response writers
/// can wrap it alongside errors without knowing the application's types.
#[derive(Debug, Clone, Default)]
pub struct WsResponse {
    http_status: Option<StatusCode>,
    body: Option<serde_json::Value>,
    errors: ServiceErrors,
    headers: BTreeMap<String, String>,
}

impl WsResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty response whose errors resolve codes through `finder`.
    #[must_use]
    pub fn with_finder(finder: Arc<dyn ServiceErrorFinder>) -> Self {
        Self {
            errors: ServiceErrors::with_finder(finder),
            ..Self::default()
        }
    }

    /// Returns the explicit status, if one was set.
    #[must_use]
    pub const fn http_status(&self) -> Option<StatusCode> {
        self.http_status
    }

    /// Overrides status determination with `status`.
    pub fn set_http_status(&mut self, status: StatusCode) {
        self.http_status = Some(status);
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Sets the body to an already-serialised value.
    pub fn set_body(&mut self, body: serde_json::Value) {
        self.body = Some(body);
    }

    /// Serialises `body` and sets it as the body.
    pub fn set_body_from<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<(), serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(())
    }

    /// Removes the body.
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    /// Returns the recorded errors.
    #[must_use]
    pub const fn errors(&self) -> &ServiceErrors {
        &self.errors
    }

    /// Returns the recorded errors mutably.
    pub fn errors_mut(&mut self) -> &mut ServiceErrors {
        &mut self.errors
    }

    /// Replaces the recorded errors.
    pub fn set_errors(&mut self, errors: ServiceErrors) {
        self.errors = errors;
    }

    /// Returns the response-specific headers.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Sets a response-specific header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }
}

/// The high-level result of processing a request.
///
/// Exactly one outcome applies to a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WsOutcome {
    /// Processing completed without errors.
    Normal,
    /// Processing recorded one or more anticipated errors.
    Error,
    /// Processing failed unexpectedly; the response carries only a status.
    Abnormal,
}

impl WsOutcome {
    /// Returns the lowercase name used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::Abnormal => "abnormal",
        }
    }
}

impl fmt::Display for WsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a response writer needs to render one request.
///
/// Because processing may stop at any phase, the request head may be absent
/// and the response may be incomplete. Writers must not assume otherwise.
#[derive(Debug)]
pub struct WsProcessState<'w> {
    /// The request as it stood when processing stopped.
    pub request: Option<RequestHead>,

    /// The response built so far.
    pub response: WsResponse,

    /// The HTTP output.
    pub sink: &'w mut HttpResponseWriter,

    /// Errors detected during processing. When set, these supersede the
    /// errors on [`response`](Self::response).
    pub service_errors: Option<ServiceErrors>,

    /// The caller's identity.
    pub identity: ClientIdentity,

    /// The status for an abnormal outcome.
    pub status: Option<StatusCode>,
}

impl<'w> WsProcessState<'w> {
    /// Creates a state for a request that is about to be processed.
    pub fn new(sink: &'w mut HttpResponseWriter, response: WsResponse) -> Self {
        Self {
            request: None,
            response,
            sink,
            service_errors: None,
            identity: ClientIdentity::default(),
            status: None,
        }
    }

    /// Creates a state for a request that ended with an abnormal (5xx) outcome.
    pub fn abnormal(status: StatusCode, sink: &'w mut HttpResponseWriter) -> Self {
        Self {
            status: Some(status),
            ..Self::new(sink, WsResponse::new())
        }
    }

    /// Returns the errors to report: the state's own errors if set,
    /// otherwise the response's.
    #[must_use]
    pub fn effective_errors(&self) -> &ServiceErrors {
        self.service_errors.as_ref().unwrap_or(&self.response.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypatia_core::ServiceErrorCategory;

    #[test]
    fn test_set_body_from_serializable() {
        #[derive(Serialize)]
        struct Album {
            title: &'static str,
        }

        let mut response = WsResponse::new();
        response.set_body_from(&Album { title: "Kind of Blue" }).unwrap();
        assert_eq!(
            response.body(),
            Some(&serde_json::json!({"title": "Kind of Blue"}))
        );
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(WsOutcome::Normal.to_string(), "normal");
        assert_eq!(WsOutcome::Error.as_str(), "error");
        assert_eq!(WsOutcome::Abnormal.as_str(), "abnormal");
    }

    #[test]
    fn test_state_errors_supersede_response_errors() {
        let mut sink = HttpResponseWriter::new();
        let mut response = WsResponse::new();
        response
            .errors_mut()
            .add_new_error(ServiceErrorCategory::Logic, "CONFLICT", "Conflict");

        let mut state = WsProcessState::new(&mut sink, response);
        assert_eq!(state.effective_errors().len(), 1);

        state.service_errors = Some(ServiceErrors::new());
        assert!(state.effective_errors().is_empty());
    }

    #[test]
    fn test_abnormal_state() {
        let mut sink = HttpResponseWriter::new();
        let state = WsProcessState::abnormal(StatusCode::SERVICE_UNAVAILABLE, &mut sink);
        assert_eq!(state.status, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(state.response.body().is_none());
    }
}
