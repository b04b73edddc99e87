//! Response writing.
//!
//! A [`ResponseWriter`] turns the final [`WsProcessState`] of a request into
//! HTTP output. [`MarshallingResponseWriter`] does this by composing small
//! capabilities: a status determiner, an optional common-header builder, an
//! error formatter, a response wrapper and a marshalling writer.

use crate::error::WriteError;
use crate::json::{JsonErrorFormatter, JsonMarshalingWriter, JsonResponseWrapper};
use crate::response::{WsOutcome, WsProcessState, WsResponse};
use crate::sink::HttpResponseWriter;
use crate::status::{DefaultStatusDeterminer, HttpStatusCodeDeterminer};
use hypatia_core::{FrameworkErrorGenerator, RequestContext, ServiceErrorCategory, ServiceErrors};
use http::StatusCode;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Writes the result of a request to its HTTP output.
pub trait ResponseWriter: Send + Sync {
    /// Renders `state` according to `outcome`.
    ///
    /// Writing to a sink that has already sent data is a no-op.
    fn write(
        &self,
        ctx: &RequestContext,
        state: &mut WsProcessState<'_>,
        outcome: WsOutcome,
    ) -> Result<(), WriteError>;
}

/// Writes a valid response for a request with an abnormal (5xx) outcome.
pub trait AbnormalStatusWriter: Send + Sync {
    /// Writes a response carrying only the status in `state`.
    fn write_abnormal_status(
        &self,
        ctx: &RequestContext,
        state: &mut WsProcessState<'_>,
    ) -> Result<(), WriteError>;
}

/// Builds headers common to every response, such as caching directives.
///
/// Implementations must tolerate an incomplete state.
pub trait CommonResponseHeaderBuilder: Send + Sync {
    /// Returns the headers to add to the response.
    fn build_headers(
        &self,
        ctx: &RequestContext,
        state: &WsProcessState<'_>,
    ) -> BTreeMap<String, String>;
}

/// Converts service errors into a serialisable structure.
pub trait ErrorFormatter: Send + Sync {
    /// Formats `errors`, returning `None` if there is nothing to report.
    fn format_errors(&self, errors: &ServiceErrors) -> Option<serde_json::Value>;
}

/// Wraps a response body and formatted errors in a common structure.
pub trait ResponseWrapper: Send + Sync {
    /// Returns the value to marshal.
    fn wrap_response(
        &self,
        body: Option<&serde_json::Value>,
        errors: Option<serde_json::Value>,
    ) -> serde_json::Value;
}

/// Serialises a value and writes it to the HTTP output.
pub trait MarshalingWriter: Send + Sync {
    /// Serialises `data` into `sink`.
    fn marshal_and_write(
        &self,
        data: &serde_json::Value,
        sink: &mut HttpResponseWriter,
    ) -> Result<(), WriteError>;
}

/// Merges response headers from three sources.
///
/// Precedence from lowest to highest is `defaults`, `common`, then the
/// response's own headers. Names are compared case-insensitively and
/// returned in lowercase.
#[must_use]
pub fn merge_headers(
    response: &BTreeMap<String, String>,
    common: Option<&BTreeMap<String, String>>,
    defaults: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    let sources = [Some(defaults), common, Some(response)];
    for (name, value) in sources.into_iter().flatten().flatten() {
        merged.insert(name.to_ascii_lowercase(), value.clone());
    }
    merged
}

/// A response writer that marshals the response rather than rendering a template.
#[derive(Clone)]
pub struct MarshallingResponseWriter {
    status_determiner: Arc<dyn HttpStatusCodeDeterminer>,
    framework_errors: Arc<FrameworkErrorGenerator>,
    default_headers: BTreeMap<String, String>,
    header_builder: Option<Arc<dyn CommonResponseHeaderBuilder>>,
    error_formatter: Arc<dyn ErrorFormatter>,
    response_wrapper: Arc<dyn ResponseWrapper>,
    marshaling_writer: Arc<dyn MarshalingWriter>,
}

impl fmt::Debug for MarshallingResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallingResponseWriter")
            .field("default_headers", &self.default_headers)
            .field("header_builder", &self.header_builder.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for MarshallingResponseWriter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MarshallingResponseWriter {
    /// Creates a builder preconfigured for JSON.
    #[must_use]
    pub fn builder() -> MarshallingResponseWriterBuilder {
        MarshallingResponseWriterBuilder::new()
    }

    /// Returns the static default headers.
    #[must_use]
    pub const fn default_headers(&self) -> &BTreeMap<String, String> {
        &self.default_headers
    }

    fn render(
        &self,
        ctx: &RequestContext,
        response: &WsResponse,
        common: Option<&BTreeMap<String, String>>,
        sink: &mut HttpResponseWriter,
    ) -> Result<(), WriteError> {
        let headers = merge_headers(response.headers(), common, &self.default_headers);
        for (name, value) in &headers {
            if !sink.set_header(name, value) {
                tracing::warn!(
                    target: "hypatia::ws::writer",
                    header = %name,
                    "Skipping invalid response header"
                );
            }
        }

        let status = self.status_determiner.determine_code(response);
        sink.write_status(status);

        let errors = self.conceal_unexpected(ctx, response.errors());
        if response.body().is_none() && !errors.has_errors() {
            return Ok(());
        }

        let formatted = self.error_formatter.format_errors(&errors);
        let wrapped = self.response_wrapper.wrap_response(response.body(), formatted);
        self.marshaling_writer.marshal_and_write(&wrapped, sink)
    }

    /// Replaces the message of every `Unexpected` error with the generic
    /// message for 500, logging the original.
    fn conceal_unexpected<'e>(
        &self,
        ctx: &RequestContext,
        errors: &'e ServiceErrors,
    ) -> Cow<'e, ServiceErrors> {
        if !errors.has_category(ServiceErrorCategory::Unexpected) {
            return Cow::Borrowed(errors);
        }

        let generic = self
            .framework_errors
            .http_error(StatusCode::INTERNAL_SERVER_ERROR);
        let mut concealed = errors.clone();
        for error in concealed
            .iter_mut()
            .filter(|e| e.category() == ServiceErrorCategory::Unexpected)
        {
            tracing::error!(
                target: "hypatia::ws::writer",
                request_id = %ctx.request_id(),
                code = %error.code(),
                message = %error.message(),
                "Unexpected error"
            );
            error.set_message(generic.message());
        }
        Cow::Owned(concealed)
    }

    /// Builds the response for an error outcome: the state's errors with the
    /// original response's status override and headers, and no body.
    fn error_response(state: &WsProcessState<'_>) -> WsResponse {
        let mut response = WsResponse::new();
        if let Some(status) = state.response.http_status() {
            response.set_http_status(status);
        }
        for (name, value) in state.response.headers() {
            response.set_header(name.clone(), value.clone());
        }
        response.set_errors(state.effective_errors().clone());
        response
    }

    fn abnormal_response(&self, status: StatusCode) -> WsResponse {
        let mut response = WsResponse::new();
        response.set_http_status(status);
        response
            .errors_mut()
            .add_error(self.framework_errors.http_error(status));
        response
    }
}

impl ResponseWriter for MarshallingResponseWriter {
    fn write(
        &self,
        ctx: &RequestContext,
        state: &mut WsProcessState<'_>,
        outcome: WsOutcome,
    ) -> Result<(), WriteError> {
        if state.sink.data_sent() {
            tracing::debug!(
                target: "hypatia::ws::writer",
                request_id = %ctx.request_id(),
                "Response already written to"
            );
            return Ok(());
        }

        let common = self
            .header_builder
            .as_ref()
            .map(|builder| builder.build_headers(ctx, state));

        let result = match outcome {
            WsOutcome::Normal => {
                self.render(ctx, &state.response, common.as_ref(), &mut *state.sink)
            }
            WsOutcome::Error => {
                let response = Self::error_response(state);
                self.render(ctx, &response, common.as_ref(), &mut *state.sink)
            }
            WsOutcome::Abnormal => {
                let status = state.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let response = self.abnormal_response(status);
                self.render(ctx, &response, common.as_ref(), &mut *state.sink)
            }
        };

        tracing::debug!(
            target: "hypatia::ws::writer",
            request_id = %ctx.request_id(),
            %outcome,
            status = state.sink.status().map(|s| s.as_u16()),
            "Wrote response"
        );

        result
    }
}

impl AbnormalStatusWriter for MarshallingResponseWriter {
    fn write_abnormal_status(
        &self,
        ctx: &RequestContext,
        state: &mut WsProcessState<'_>,
    ) -> Result<(), WriteError> {
        self.write(ctx, state, WsOutcome::Abnormal)
    }
}

/// Builder for [`MarshallingResponseWriter`].
///
/// Every capability defaults to its JSON implementation.
#[derive(Clone)]
pub struct MarshallingResponseWriterBuilder {
    inner: MarshallingResponseWriter,
}

impl MarshallingResponseWriterBuilder {
    /// Creates a builder with JSON defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MarshallingResponseWriter {
                status_determiner: Arc::new(DefaultStatusDeterminer),
                framework_errors: Arc::new(FrameworkErrorGenerator::default()),
                default_headers: BTreeMap::new(),
                header_builder: None,
                error_formatter: Arc::new(JsonErrorFormatter),
                response_wrapper: Arc::new(JsonResponseWrapper::default()),
                marshaling_writer: Arc::new(JsonMarshalingWriter::default()),
            },
        }
    }

    /// Sets the status determiner.
    #[must_use]
    pub fn status_determiner(mut self, determiner: Arc<dyn HttpStatusCodeDeterminer>) -> Self {
        self.inner.status_determiner = determiner;
        self
    }

    /// Sets the generator used for abnormal-status errors.
    #[must_use]
    pub fn framework_errors(mut self, generator: Arc<FrameworkErrorGenerator>) -> Self {
        self.inner.framework_errors = generator;
        self
    }

    /// Adds a static default header.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.default_headers.insert(name.into(), value.into());
        self
    }

    /// Replaces the static default headers.
    #[must_use]
    pub fn default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.inner.default_headers = headers;
        self
    }

    /// Sets the common header builder.
    #[must_use]
    pub fn header_builder(mut self, builder: Arc<dyn CommonResponseHeaderBuilder>) -> Self {
        self.inner.header_builder = Some(builder);
        self
    }

    /// Sets the error formatter.
    #[must_use]
    pub fn error_formatter(mut self, formatter: Arc<dyn ErrorFormatter>) -> Self {
        self.inner.error_formatter = formatter;
        self
    }

    /// Sets the response wrapper.
    #[must_use]
    pub fn response_wrapper(mut self, wrapper: Arc<dyn ResponseWrapper>) -> Self {
        self.inner.response_wrapper = wrapper;
        self
    }

    /// Sets the marshalling writer.
    #[must_use]
    pub fn marshaling_writer(mut self, writer: Arc<dyn MarshalingWriter>) -> Self {
        self.inner.marshaling_writer = writer;
        self
    }

    /// Builds the writer.
    #[must_use]
    pub fn build(self) -> MarshallingResponseWriter {
        self.inner
    }
}

impl Default for MarshallingResponseWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::BodyOrErrorWrapper;
    use hypatia_core::ServiceErrorCategory;
    use serde_json::{json, Value};

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn body_json(sink: &HttpResponseWriter) -> Value {
        serde_json::from_slice(sink.body()).unwrap()
    }

    struct ServerHeader;

    impl CommonResponseHeaderBuilder for ServerHeader {
        fn build_headers(
            &self,
            _ctx: &RequestContext,
            _state: &WsProcessState<'_>,
        ) -> BTreeMap<String, String> {
            headers(&[("Server", "hypatia"), ("Cache-Control", "no-store")])
        }
    }

    #[test]
    fn test_merge_headers_precedence() {
        let defaults = headers(&[("Content-Type", "text/plain"), ("X-Default", "d")]);
        let common = headers(&[("content-type", "application/json"), ("X-Common", "c")]);
        let response = headers(&[("X-Common", "r")]);

        let merged = merge_headers(&response, Some(&common), &defaults);
        assert_eq!(
            merged,
            headers(&[
                ("content-type", "application/json"),
                ("x-common", "r"),
                ("x-default", "d"),
            ])
        );
    }

    #[test]
    fn test_normal_write() {
        let writer = MarshallingResponseWriter::builder()
            .default_header("Cache-Control", "max-age=60")
            .header_builder(Arc::new(ServerHeader))
            .build();
        let ctx = RequestContext::new();
        let mut sink = HttpResponseWriter::new();
        let mut response = WsResponse::new();
        response.set_body(json!({"title": "Giant Steps"}));
        response.set_header("X-Album", "1");

        let mut state = WsProcessState::new(&mut sink, response);
        writer.write(&ctx, &mut state, WsOutcome::Normal).unwrap();

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert_eq!(sink.headers().get("cache-control").unwrap(), "no-store");
        assert_eq!(sink.headers().get("server").unwrap(), "hypatia");
        assert_eq!(sink.headers().get("x-album").unwrap(), "1");
        assert_eq!(body_json(&sink), json!({"response": {"title": "Giant Steps"}}));
    }

    #[test]
    fn test_no_body_and_no_errors_writes_status_only() {
        let writer = MarshallingResponseWriter::default();
        let mut sink = HttpResponseWriter::new();
        let mut state = WsProcessState::new(&mut sink, WsResponse::new());
        writer
            .write(&RequestContext::new(), &mut state, WsOutcome::Normal)
            .unwrap();

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert!(sink.body().is_empty());
    }

    #[test]
    fn test_second_write_is_ignored() {
        let writer = MarshallingResponseWriter::default();
        let ctx = RequestContext::new();
        let mut sink = HttpResponseWriter::new();
        let mut response = WsResponse::new();
        response.set_body(json!([1, 2, 3]));

        let mut state = WsProcessState::new(&mut sink, response);
        writer.write(&ctx, &mut state, WsOutcome::Normal).unwrap();
        let first = state.sink.body().to_vec();

        state
            .response
            .errors_mut()
            .add_new_error(ServiceErrorCategory::Unexpected, "LATE", "Too late");
        writer.write(&ctx, &mut state, WsOutcome::Error).unwrap();

        assert_eq!(sink.body(), first.as_slice());
        assert_eq!(sink.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_error_outcome_uses_state_errors() {
        let writer = MarshallingResponseWriter::default();
        let mut sink = HttpResponseWriter::new();
        let mut response = WsResponse::new();
        response.set_body(json!({"ignored": true}));
        response.set_header("X-Trace", "t1");

        let mut errors = ServiceErrors::new();
        errors.add_new_error(ServiceErrorCategory::Client, "NO_TITLE", "A title is required.");

        let mut state = WsProcessState::new(&mut sink, response);
        state.service_errors = Some(errors);
        writer
            .write(&RequestContext::new(), &mut state, WsOutcome::Error)
            .unwrap();

        assert_eq!(sink.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(sink.headers().get("x-trace").unwrap(), "t1");
        assert_eq!(
            body_json(&sink),
            json!({"errors": {"general": [{"code": "C-NO_TITLE", "message": "A title is required."}]}})
        );
    }

    #[test]
    fn test_unexpected_error_message_is_replaced() {
        let generator = FrameworkErrorGenerator::default()
            .with_http_message(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.");
        let writer = MarshallingResponseWriter::builder()
            .framework_errors(Arc::new(generator))
            .build();
        let mut sink = HttpResponseWriter::new();

        let mut errors = ServiceErrors::new();
        errors.add_new_error(ServiceErrorCategory::Client, "NO_TITLE", "A title is required.");
        errors.add_new_error(ServiceErrorCategory::Unexpected, "DB_DOWN", "pool exhausted at db-3");

        let mut state = WsProcessState::new(&mut sink, WsResponse::new());
        state.service_errors = Some(errors);
        writer
            .write(&RequestContext::new(), &mut state, WsOutcome::Error)
            .unwrap();

        assert_eq!(sink.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(
            body_json(&sink),
            json!({"errors": {"general": [
                {"code": "C-NO_TITLE", "message": "A title is required."},
                {"code": "U-DB_DOWN", "message": "Something went wrong."}
            ]}})
        );
    }

    #[test]
    fn test_abnormal_status_write() {
        let generator = FrameworkErrorGenerator::default()
            .with_http_message(StatusCode::SERVICE_UNAVAILABLE, "Try again later.");
        let writer = MarshallingResponseWriter::builder()
            .framework_errors(Arc::new(generator))
            .response_wrapper(Arc::new(BodyOrErrorWrapper))
            .build();
        let mut sink = HttpResponseWriter::new();
        let mut state = WsProcessState::abnormal(StatusCode::SERVICE_UNAVAILABLE, &mut sink);

        writer
            .write_abnormal_status(&RequestContext::new(), &mut state)
            .unwrap();

        assert_eq!(sink.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            body_json(&sink),
            json!({"general": [{"code": "H-503", "message": "Try again later."}]})
        );
    }
}
