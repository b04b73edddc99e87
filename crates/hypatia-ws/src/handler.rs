//! The request-processing state machine.
//!
//! A [`WsHandler`] takes one HTTP request through a fixed sequence of phases
//! and produces exactly one write to the response sink:
//!
//! ```text
//! Identify -> Access -> UnmarshalTarget -> Unmarshal -> PathBind -> QueryBind
//!          -> PreValidate -> Validate -> Process -> PostProcess -> Write
//! ```
//!
//! Optional phases run only when the logic (or handler configuration)
//! supports them. Framework errors recorded while decoding or binding the
//! request stop processing after the phase that recorded them.

use crate::binder::{BindFn, ParamBinder};
use crate::error::{HandlerBuildError, WriteError};
use crate::iam::{AccessChecker, Identifier};
use crate::logic::{Logic, PhaseCapabilities, PostProcessor, PreValidator, UnmarshalTarget, Validator};
use crate::request::{RequestHead, WsRequest};
use crate::response::{WsOutcome, WsProcessState, WsResponse};
use crate::sink::HttpResponseWriter;
use crate::unmarshal::{JsonUnmarshaller, Unmarshaller};
use crate::writer::{MarshallingResponseWriter, ResponseWriter};
use bytes::Bytes;
use futures_util::FutureExt;
use hypatia_core::{
    CategorisedError, FrameworkErrorEvent, FrameworkErrorGenerator, ParamTarget, RequestContext,
    ServiceErrorCategory, ServiceErrorFinder, ServiceErrors, Subject, WsFrameworkError, WsParams,
};
use hypatia_telemetry::metrics::{record_request, record_validation_failure, InFlightGuard};
use hypatia_validate::RuleValidator;
use http::StatusCode;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

/// Code of the error recorded when a handler requires an authenticated
/// caller and the caller is not authenticated.
pub const UNAUTHENTICATED_CODE: &str = "UNAUTHENTICATED";

const UNAUTHENTICATED_MESSAGE: &str = "Authentication is required to use this service";

const LOG_TARGET: &str = "hypatia::ws::handler";

type SubjectCheck<B> = Box<dyn Fn(&B, &mut ServiceErrors) -> bool + Send + Sync>;

struct PathBinding<B> {
    pattern: Regex,
    bind: Option<BindFn<B>>,
    targets: Vec<String>,
}

struct QueryBinding<B> {
    bind: BindFn<B>,
    targets: Vec<(String, String)>,
}

/// How processing of a request finished.
enum Completion {
    /// Process ran; the response carries any errors it recorded.
    Processed,
    /// Processing stopped before Process with these errors.
    Rejected(ServiceErrors),
}

/// Processes requests for one web service endpoint.
///
/// # Example
///
/// ```rust,ignore
/// let handler = WsHandler::builder("create-album", CreateAlbum)
///     .json_body()
///     .path_pattern(r"^/albums/(\w+)$")
///     .bind_path(["artist"])
///     .validate_with(rules)
///     .build()?;
///
/// let mut sink = HttpResponseWriter::new();
/// handler.serve(RequestContext::new(), &mut sink, request).await?;
/// let response = sink.into_response();
/// ```
pub struct WsHandler<L: Logic> {
    name: String,
    logic: L,
    capabilities: PhaseCapabilities,
    writer: Arc<dyn ResponseWriter>,
    unmarshaller: Option<Arc<dyn Unmarshaller<L::Body>>>,
    binder: ParamBinder,
    error_finder: Option<Arc<dyn ServiceErrorFinder>>,
    identifier: Option<Arc<dyn Identifier>>,
    access_checker: Option<Arc<dyn AccessChecker>>,
    require_authentication: bool,
    path: Option<PathBinding<L::Body>>,
    query: Option<QueryBinding<L::Body>>,
    subject_check: Option<SubjectCheck<L::Body>>,
}

impl<L: Logic> fmt::Debug for WsHandler<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsHandler")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("require_authentication", &self.require_authentication)
            .field("path_pattern", &self.path.as_ref().map(|p| p.pattern.as_str()))
            .field("query_binding", &self.query.is_some())
            .field("rule_validation", &self.subject_check.is_some())
            .finish_non_exhaustive()
    }
}

impl<L: Logic> WsHandler<L> {
    /// Starts building a handler named `name` around `logic`.
    pub fn builder(name: impl Into<String>, logic: L) -> WsHandlerBuilder<L> {
        WsHandlerBuilder::new(name, logic)
    }

    /// Returns the handler's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional phases the logic supports.
    #[must_use]
    pub const fn capabilities(&self) -> PhaseCapabilities {
        self.capabilities
    }

    /// Returns the logic.
    #[must_use]
    pub const fn logic(&self) -> &L {
        &self.logic
    }

    /// Processes `request`, writing the result to `sink`.
    ///
    /// Exactly one write is made to `sink`. A panic during processing is
    /// caught and answered with HTTP 500.
    ///
    /// # Errors
    ///
    /// Returns an error if the response could not be written.
    pub async fn serve(
        &self,
        ctx: RequestContext,
        sink: &mut HttpResponseWriter,
        request: http::Request<Bytes>,
    ) -> Result<(), WriteError> {
        let ctx = ctx.with_handler_name(self.name.as_str());
        let span = tracing::info_span!(
            target: LOG_TARGET,
            "ws_request",
            handler = %self.name,
            request_id = %ctx.request_id(),
        );

        self.serve_in_span(&ctx, sink, request).instrument(span).await
    }

    async fn serve_in_span(
        &self,
        ctx: &RequestContext,
        sink: &mut HttpResponseWriter,
        request: http::Request<Bytes>,
    ) -> Result<(), WriteError> {
        let _in_flight = InFlightGuard::new();

        let (parts, raw_body) = request.into_parts();
        let head = RequestHead::new(parts.method, parts.uri, parts.headers);
        let mut request = WsRequest::new(head, raw_body);
        let mut response = self.new_response();

        let run = AssertUnwindSafe(self.run_phases(ctx, &mut request, &mut response));
        let (outcome, service_errors, status) = match run.catch_unwind().await {
            Ok(Completion::Processed) if response.errors().has_errors() => {
                (WsOutcome::Error, None, None)
            }
            Ok(Completion::Processed) => (WsOutcome::Normal, None, None),
            Ok(Completion::Rejected(errors)) => (WsOutcome::Error, Some(errors), None),
            Err(panic) => {
                tracing::error!(
                    target: LOG_TARGET,
                    handler = %self.name,
                    panic = panic_message(panic.as_ref()),
                    "Request processing panicked"
                );
                response = self.new_response();
                (WsOutcome::Abnormal, None, Some(StatusCode::INTERNAL_SERVER_ERROR))
            }
        };

        let mut state = WsProcessState::new(sink, response);
        state.identity = request.identity().clone();
        state.request = Some(request.head().clone());
        state.service_errors = service_errors;
        state.status = status;

        let result = self.writer.write(ctx, &mut state, outcome);

        let status = state
            .sink
            .status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let duration = ctx.elapsed();
        record_request(&self.name, outcome.as_str(), status.as_u16(), duration);

        match &result {
            Ok(()) => tracing::info!(
                target: LOG_TARGET,
                handler = %self.name,
                user = state.identity.loggable_user_id(),
                outcome = %outcome,
                status = status.as_u16(),
                duration_ms = duration.as_secs_f64() * 1000.0,
                "Request completed"
            ),
            Err(e) => tracing::error!(
                target: LOG_TARGET,
                handler = %self.name,
                outcome = %outcome,
                error = %e,
                "Failed to write response"
            ),
        }

        result
    }

    async fn run_phases(
        &self,
        ctx: &RequestContext,
        request: &mut WsRequest<L::Body>,
        response: &mut WsResponse,
    ) -> Completion {
        // Identify
        if let Some(identifier) = &self.identifier {
            let identity = identifier.identify(ctx, request.head());
            request.set_identity(identity);
        }

        if self.require_authentication && !request.identity().is_authenticated() {
            tracing::debug!(target: LOG_TARGET, handler = %self.name, "Caller is not authenticated");
            let mut errors = self.new_errors();
            errors.add_error(self.unauthenticated_error());
            return Completion::Rejected(errors);
        }

        // Access
        if let Some(checker) = &self.access_checker {
            if !checker.allowed(ctx, request.head(), request.identity()) {
                tracing::debug!(
                    target: LOG_TARGET,
                    handler = %self.name,
                    user = request.identity().loggable_user_id(),
                    "Access denied"
                );
                let mut errors = self.new_errors();
                errors.add_error(self.binder.generator().http_error(StatusCode::FORBIDDEN));
                return Completion::Rejected(errors);
            }
        }

        // UnmarshalTarget
        if let Some(target) = self.unmarshal_target() {
            request.set_body(target.unmarshal_target(ctx));
        }

        // Unmarshal
        self.unmarshal(ctx, request);
        if request.has_framework_errors() {
            return self.reject_framework_errors(request);
        }

        // PathBind
        self.bind_path(request);
        if request.has_framework_errors() {
            return self.reject_framework_errors(request);
        }

        // QueryBind
        self.bind_query(request);
        if request.has_framework_errors() {
            return self.reject_framework_errors(request);
        }

        // PreValidate
        let mut errors = self.new_errors();
        if let Some(pre_validator) = self.pre_validator() {
            if !pre_validator.pre_validate(ctx, request, &mut errors) {
                if errors.has_errors() {
                    tracing::debug!(target: LOG_TARGET, handler = %self.name, "Pre-validation stopped processing");
                } else {
                    tracing::warn!(
                        target: LOG_TARGET,
                        handler = %self.name,
                        "Pre-validation stopped processing without recording an error"
                    );
                }
                return Completion::Rejected(errors);
            }
        }

        // Validate
        if let (Some(check), Some(body)) = (&self.subject_check, request.body()) {
            check(body, &mut errors);
        }
        if let Some(validator) = self.validator() {
            validator.validate(ctx, &mut errors, request);
        }

        if errors.has_errors() {
            tracing::debug!(
                target: LOG_TARGET,
                handler = %self.name,
                errors = errors.len(),
                "Request failed validation"
            );
            record_validation_failure(&self.name);
            self.post_process(ctx, request, response);
            return Completion::Rejected(errors);
        }

        // Process
        self.logic.process(ctx, request, response).await;

        // PostProcess
        self.post_process(ctx, request, response);

        Completion::Processed
    }

    fn unmarshal(&self, ctx: &RequestContext, request: &mut WsRequest<L::Body>) {
        let Some(unmarshaller) = &self.unmarshaller else {
            return;
        };
        let raw = request.raw_body().clone();
        let Some(body) = request.body_mut() else {
            return;
        };

        if let Err(e) = unmarshaller.unmarshal(ctx, &raw, body) {
            tracing::debug!(target: LOG_TARGET, handler = %self.name, error = e.message(), "Unable to parse request body");
            let (message, code) = self
                .binder
                .generator()
                .message_code(FrameworkErrorEvent::UnableToParseRequest, &[]);
            request.add_framework_error(WsFrameworkError::unmarshal(message, code));
        }
    }

    fn bind_path(&self, request: &mut WsRequest<L::Body>) {
        let Some(path) = &self.path else {
            return;
        };

        let params = match path.pattern.captures(request.head().path()) {
            Some(captures) => {
                let values: Vec<&str> = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map_or("", |m| m.as_str()))
                    .collect();
                WsParams::for_path(&path.targets, &values)
            }
            None => WsParams::default(),
        };

        if let Some(bind) = path.bind {
            if let Some(mut body) = request.take_body() {
                let errors = self.binder.bind_path(bind, &params, &mut body);
                request.set_body(body);
                for error in errors {
                    request.add_framework_error(error);
                }
            }
        }

        request.set_path_params(params);
    }

    fn bind_query(&self, request: &mut WsRequest<L::Body>) {
        let query = request.head().uri().query().unwrap_or_default();
        let params = match WsParams::from_query(query) {
            Ok(params) => params,
            Err(e) => {
                tracing::debug!(target: LOG_TARGET, handler = %self.name, error = %e, "Unable to parse query string");
                let (message, code) = self
                    .binder
                    .generator()
                    .message_code(FrameworkErrorEvent::UnableToParseRequest, &[]);
                request.add_framework_error(WsFrameworkError::unmarshal(message, code));
                return;
            }
        };

        if let Some(query) = &self.query {
            if let Some(mut body) = request.take_body() {
                let errors = self
                    .binder
                    .bind_query(query.bind, &query.targets, &params, &mut body);
                request.set_body(body);
                for error in errors {
                    request.add_framework_error(error);
                }
            }
        }

        request.set_query_params(params);
    }

    fn post_process(
        &self,
        ctx: &RequestContext,
        request: &WsRequest<L::Body>,
        response: &mut WsResponse,
    ) {
        if let Some(post_processor) = self.post_processor() {
            post_processor.post_process(ctx, &self.name, request, response);
        }
    }

    fn unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<L::Body>> {
        if self.capabilities.unmarshal_target {
            self.logic.as_unmarshal_target()
        } else {
            None
        }
    }

    fn pre_validator(&self) -> Option<&dyn PreValidator<L::Body>> {
        if self.capabilities.pre_validate {
            self.logic.as_pre_validator()
        } else {
            None
        }
    }

    fn validator(&self) -> Option<&dyn Validator<L::Body>> {
        if self.capabilities.validate {
            self.logic.as_validator()
        } else {
            None
        }
    }

    fn post_processor(&self) -> Option<&dyn PostProcessor<L::Body>> {
        if self.capabilities.post_process {
            self.logic.as_post_processor()
        } else {
            None
        }
    }

    fn reject_framework_errors(&self, request: &WsRequest<L::Body>) -> Completion {
        let mut errors = self.new_errors();
        for error in request.framework_errors() {
            tracing::debug!(
                target: LOG_TARGET,
                handler = %self.name,
                phase = error.phase.name(),
                field = error.client_field.as_deref().unwrap_or_default(),
                code = %error.code,
                "Framework error"
            );
            errors.add_error(error.to_categorised());
        }
        Completion::Rejected(errors)
    }

    fn unauthenticated_error(&self) -> CategorisedError {
        self.error_finder
            .as_ref()
            .and_then(|finder| finder.find(UNAUTHENTICATED_CODE))
            .unwrap_or_else(|| {
                CategorisedError::new(
                    ServiceErrorCategory::Security,
                    UNAUTHENTICATED_CODE,
                    UNAUTHENTICATED_MESSAGE,
                )
            })
    }

    fn new_errors(&self) -> ServiceErrors {
        self.error_finder
            .as_ref()
            .map_or_else(ServiceErrors::new, |f| ServiceErrors::with_finder(Arc::clone(f)))
    }

    fn new_response(&self) -> WsResponse {
        self.error_finder
            .as_ref()
            .map_or_else(WsResponse::new, |f| WsResponse::with_finder(Arc::clone(f)))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Builder for [`WsHandler`].
pub struct WsHandlerBuilder<L: Logic> {
    name: String,
    logic: L,
    writer: Option<Arc<dyn ResponseWriter>>,
    unmarshaller: Option<Arc<dyn Unmarshaller<L::Body>>>,
    generator: Option<Arc<FrameworkErrorGenerator>>,
    error_finder: Option<Arc<dyn ServiceErrorFinder>>,
    identifier: Option<Arc<dyn Identifier>>,
    access_checker: Option<Arc<dyn AccessChecker>>,
    require_authentication: bool,
    path_pattern: Option<String>,
    path_targets: Vec<String>,
    query_targets: Vec<(String, String)>,
    auto_bind_query: bool,
    bind: Option<BindFn<L::Body>>,
    param_fields: &'static [&'static str],
    subject_check: Option<SubjectCheck<L::Body>>,
}

impl<L: Logic> WsHandlerBuilder<L> {
    /// Creates a builder for a handler named `name` around `logic`.
    pub fn new(name: impl Into<String>, logic: L) -> Self {
        Self {
            name: name.into(),
            logic,
            writer: None,
            unmarshaller: None,
            generator: None,
            error_finder: None,
            identifier: None,
            access_checker: None,
            require_authentication: false,
            path_pattern: None,
            path_targets: Vec::new(),
            query_targets: Vec::new(),
            auto_bind_query: false,
            bind: None,
            param_fields: &[],
            subject_check: None,
        }
    }

    /// Sets the response writer. Defaults to a JSON [`MarshallingResponseWriter`].
    #[must_use]
    pub fn response_writer(mut self, writer: Arc<dyn ResponseWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Sets the request body parser.
    #[must_use]
    pub fn unmarshaller(mut self, unmarshaller: Arc<dyn Unmarshaller<L::Body>>) -> Self {
        self.unmarshaller = Some(unmarshaller);
        self
    }

    /// Parses request bodies as JSON.
    #[must_use]
    pub fn json_body(self) -> Self
    where
        L::Body: DeserializeOwned,
    {
        self.unmarshaller(Arc::new(JsonUnmarshaller))
    }

    /// Sets the generator used for framework error messages.
    #[must_use]
    pub fn framework_errors(mut self, generator: Arc<FrameworkErrorGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Sets the source of predefined service errors.
    #[must_use]
    pub fn error_finder(mut self, finder: Arc<dyn ServiceErrorFinder>) -> Self {
        self.error_finder = Some(finder);
        self
    }

    /// Sets the caller identifier.
    #[must_use]
    pub fn identifier(mut self, identifier: Arc<dyn Identifier>) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Sets the access checker.
    #[must_use]
    pub fn access_checker(mut self, checker: Arc<dyn AccessChecker>) -> Self {
        self.access_checker = Some(checker);
        self
    }

    /// Rejects callers that are not authenticated.
    #[must_use]
    pub const fn require_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    /// Sets the regular expression whose capture groups supply path parameters.
    #[must_use]
    pub fn path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    /// Binds path capture groups, in order, to the named body fields.
    #[must_use]
    pub fn bind_path<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        L::Body: ParamTarget,
    {
        self.enable_binding();
        self.path_targets = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Binds query parameters to body fields, given as `(field, parameter)` pairs.
    #[must_use]
    pub fn bind_query<I, F, P>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = (F, P)>,
        F: Into<String>,
        P: Into<String>,
        L::Body: ParamTarget,
    {
        self.enable_binding();
        self.query_targets = targets
            .into_iter()
            .map(|(f, p)| (f.into(), p.into()))
            .collect();
        self
    }

    /// Binds every query parameter whose name matches a body field.
    ///
    /// Explicit [`bind_query`](Self::bind_query) targets take precedence.
    #[must_use]
    pub fn auto_bind_query(mut self, enabled: bool) -> Self
    where
        L::Body: ParamTarget,
    {
        self.enable_binding();
        self.auto_bind_query = enabled;
        self
    }

    /// Validates request bodies against declarative rules before the logic's
    /// own validation.
    #[must_use]
    pub fn validate_with(mut self, rules: RuleValidator<L::Body>) -> Self
    where
        L::Body: Subject,
    {
        self.subject_check = Some(Box::new(move |body, errors| {
            rules.validate_into(body, errors)
        }));
        self
    }

    fn enable_binding(&mut self)
    where
        L::Body: ParamTarget,
    {
        self.bind = Some(<L::Body as ParamTarget>::bind_field);
        self.param_fields = <L::Body as ParamTarget>::param_fields();
    }

    /// Builds the handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the path pattern does not
    /// compile, or a binding names a field the body does not have.
    pub fn build(self) -> Result<WsHandler<L>, HandlerBuildError> {
        if self.name.trim().is_empty() {
            return Err(HandlerBuildError::MissingName);
        }

        for field in &self.path_targets {
            self.check_bind_field(field)?;
        }
        for (field, _) in &self.query_targets {
            self.check_bind_field(field)?;
        }

        let path = match &self.path_pattern {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|source| {
                    HandlerBuildError::InvalidPathPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })?;
                let groups = regex.captures_len() - 1;
                if self.path_targets.len() > groups {
                    return Err(HandlerBuildError::TooManyPathTargets {
                        targets: self.path_targets.len(),
                        groups,
                    });
                }
                Some(PathBinding {
                    pattern: regex,
                    bind: self.bind.filter(|_| !self.path_targets.is_empty()),
                    targets: self.path_targets,
                })
            }
            None if !self.path_targets.is_empty() => {
                return Err(HandlerBuildError::PathTargetsWithoutPattern);
            }
            None => None,
        };

        let mut query_targets = self.query_targets;
        if self.auto_bind_query {
            for (field, param) in ParamBinder::auto_query_targets(self.param_fields) {
                if !query_targets.iter().any(|(f, _)| *f == field) {
                    query_targets.push((field, param));
                }
            }
        }
        let query = match self.bind {
            Some(bind) if !query_targets.is_empty() => Some(QueryBinding {
                bind,
                targets: query_targets,
            }),
            _ => None,
        };

        let capabilities = PhaseCapabilities::detect(&self.logic);
        let generator = self.generator.unwrap_or_default();
        let writer = self.writer.unwrap_or_else(|| {
            Arc::new(
                MarshallingResponseWriter::builder()
                    .framework_errors(Arc::clone(&generator))
                    .build(),
            )
        });

        tracing::debug!(
            target: LOG_TARGET,
            handler = %self.name,
            unmarshal_target = capabilities.unmarshal_target,
            pre_validate = capabilities.pre_validate,
            validate = capabilities.validate,
            post_process = capabilities.post_process,
            "Built handler"
        );

        Ok(WsHandler {
            name: self.name,
            logic: self.logic,
            capabilities,
            writer,
            unmarshaller: self.unmarshaller,
            binder: ParamBinder::new(generator),
            error_finder: self.error_finder,
            identifier: self.identifier,
            access_checker: self.access_checker,
            require_authentication: self.require_authentication,
            path,
            query,
            subject_check: self.subject_check,
        })
    }

    fn check_bind_field(&self, field: &str) -> Result<(), HandlerBuildError> {
        if self.param_fields.contains(&field) {
            Ok(())
        } else {
            Err(HandlerBuildError::UnknownBindField {
                field: field.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypatia_core::{BindError, ClientIdentity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Lookup {
        id: u32,
    }

    impl ParamTarget for Lookup {
        fn bind_field(&mut self, field: &str, params: &WsParams, key: &str) -> Result<(), BindError> {
            match field {
                "id" => hypatia_core::BindParam::bind_param(&mut self.id, params, key),
                _ => Err(BindError::NoSuchField(field.to_string())),
            }
        }

        fn param_fields() -> &'static [&'static str] {
            &["id"]
        }
    }

    struct Echo;

    impl Logic for Echo {
        type Body = Lookup;

        async fn process(
            &self,
            _ctx: &RequestContext,
            request: &mut WsRequest<Lookup>,
            response: &mut WsResponse,
        ) {
            let id = request.body().map_or(0, |b| b.id);
            response.set_body(serde_json::json!({ "id": id }));
        }

        fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<Lookup>> {
            Some(self)
        }
    }

    impl UnmarshalTarget<Lookup> for Echo {
        fn unmarshal_target(&self, _ctx: &RequestContext) -> Lookup {
            Lookup::default()
        }
    }

    struct Anyone;

    impl Identifier for Anyone {
        fn identify(&self, _ctx: &RequestContext, _request: &RequestHead) -> ClientIdentity {
            ClientIdentity::anonymous()
        }
    }

    struct Nobody;

    impl AccessChecker for Nobody {
        fn allowed(&self, _ctx: &RequestContext, _request: &RequestHead, _identity: &ClientIdentity) -> bool {
            false
        }
    }

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    async fn serve(handler: &WsHandler<Echo>, uri: &str) -> (StatusCode, serde_json::Value) {
        let mut sink = HttpResponseWriter::new();
        handler.serve(RequestContext::new(), &mut sink, get(uri)).await.unwrap();
        let status = sink.status().unwrap();
        let body = serde_json::from_slice(sink.body()).unwrap();
        (status, body)
    }

    #[test]
    fn test_build_requires_name() {
        let err = WsHandler::builder(" ", Echo).build().unwrap_err();
        assert!(matches!(err, HandlerBuildError::MissingName));
    }

    #[test]
    fn test_build_rejects_invalid_pattern() {
        let err = WsHandler::builder("lookup", Echo).path_pattern("(").build().unwrap_err();
        assert!(matches!(err, HandlerBuildError::InvalidPathPattern { .. }));
    }

    #[test]
    fn test_build_rejects_targets_without_pattern() {
        let err = WsHandler::builder("lookup", Echo).bind_path(["id"]).build().unwrap_err();
        assert!(matches!(err, HandlerBuildError::PathTargetsWithoutPattern));
    }

    #[test]
    fn test_build_rejects_more_targets_than_groups() {
        let err = WsHandler::builder("lookup", Echo)
            .path_pattern(r"^/items/(\d+)$")
            .bind_path(["id", "id"])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerBuildError::TooManyPathTargets { targets: 2, groups: 1 }
        ));
    }

    #[test]
    fn test_build_rejects_unknown_bind_field() {
        let err = WsHandler::builder("lookup", Echo)
            .bind_query([("sku", "sku")])
            .build()
            .unwrap_err();
        assert!(matches!(err, HandlerBuildError::UnknownBindField { field } if field == "sku"));
    }

    #[tokio::test]
    async fn test_path_binding() {
        let handler = WsHandler::builder("lookup", Echo)
            .path_pattern(r"^/items/(\w+)$")
            .bind_path(["id"])
            .build()
            .unwrap();

        let (status, body) = serve(&handler, "/items/42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["id"], 42);

        let (status, body) = serve(&handler, "/items/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("response").is_none());
        assert!(body["errors"]["by_field"]["id"].is_array());
    }

    #[tokio::test]
    async fn test_auto_query_binding() {
        let handler = WsHandler::builder("lookup", Echo)
            .auto_bind_query(true)
            .build()
            .unwrap();

        let (status, body) = serve(&handler, "/items?id=7&unrelated=x").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["id"], 7);
    }

    #[tokio::test]
    async fn test_require_authentication_rejects_anonymous() {
        let handler = WsHandler::builder("lookup", Echo)
            .identifier(Arc::new(Anyone))
            .require_authentication(true)
            .build()
            .unwrap();

        let (status, body) = serve(&handler, "/items").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"]["general"][0]["code"], "S-UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_access_denied_is_forbidden() {
        let handler = WsHandler::builder("lookup", Echo)
            .access_checker(Arc::new(Nobody))
            .build()
            .unwrap();

        let (status, _) = serve(&handler, "/items").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    /// Counts how often its capability accessors are consulted.
    #[derive(Default)]
    struct Counted {
        lookups: AtomicUsize,
    }

    impl Counted {
        fn consult<T: ?Sized>(&self) -> Option<&T> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    impl Logic for Counted {
        type Body = Lookup;

        async fn process(
            &self,
            _ctx: &RequestContext,
            _request: &mut WsRequest<Lookup>,
            response: &mut WsResponse,
        ) {
            response.set_body(serde_json::json!("done"));
        }

        fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<Lookup>> {
            self.consult()
        }

        fn as_pre_validator(&self) -> Option<&dyn PreValidator<Lookup>> {
            self.consult()
        }

        fn as_validator(&self) -> Option<&dyn Validator<Lookup>> {
            self.consult()
        }

        fn as_post_processor(&self) -> Option<&dyn PostProcessor<Lookup>> {
            self.consult()
        }
    }

    struct Gate;

    impl Logic for Gate {
        type Body = Lookup;

        async fn process(
            &self,
            _ctx: &RequestContext,
            _request: &mut WsRequest<Lookup>,
            response: &mut WsResponse,
        ) {
            response.set_body(serde_json::json!("processed"));
        }

        fn as_pre_validator(&self) -> Option<&dyn PreValidator<Lookup>> {
            Some(self)
        }
    }

    impl PreValidator<Lookup> for Gate {
        fn pre_validate(
            &self,
            _ctx: &RequestContext,
            _request: &mut WsRequest<Lookup>,
            _errors: &mut ServiceErrors,
        ) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_capabilities_are_detected_only_at_build() {
        let handler = WsHandler::builder("counted", Counted::default()).build().unwrap();
        assert_eq!(handler.logic.lookups.load(Ordering::SeqCst), 4);

        for _ in 0..3 {
            let mut sink = HttpResponseWriter::new();
            handler
                .serve(RequestContext::new(), &mut sink, get("/counted"))
                .await
                .unwrap();
            assert_eq!(sink.status(), Some(StatusCode::OK));
        }
        assert_eq!(handler.logic.lookups.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_pre_validate_stop_without_errors() {
        let handler = WsHandler::builder("gate", Gate).build().unwrap();

        let mut sink = HttpResponseWriter::new();
        handler
            .serve(RequestContext::new(), &mut sink, get("/gate"))
            .await
            .unwrap();

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert!(sink.body().is_empty());
    }
}
