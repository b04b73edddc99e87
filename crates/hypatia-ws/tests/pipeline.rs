//! End-to-end tests of the request-processing phases.

use bytes::Bytes;
use hypatia_core::{
    ClientIdentity, RequestContext, ServiceErrorCategory, ServiceErrorManager, ServiceErrors,
};
use hypatia_macros::{ParamTarget, Subject};
use hypatia_validate::{FieldRule, ValidatorBuilder};
use hypatia_ws::{
    AccessChecker, HttpResponseWriter, Identifier, Logic, PhaseCapabilities, PostProcessor,
    PreValidator, RequestHead, UnmarshalTarget, Validator, WsHandler, WsOutcome, WsRequest,
    WsResponse,
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Calls = Arc<Mutex<Vec<&'static str>>>;

fn record(calls: &Calls, phase: &'static str) {
    calls.lock().unwrap().push(phase);
}

fn recorded(calls: &Calls) -> Vec<&'static str> {
    calls.lock().unwrap().clone()
}

#[derive(Debug, Default, Deserialize, Subject, ParamTarget)]
#[serde(default)]
struct Album {
    title: String,
    artist: String,
    year: Option<i32>,
    #[subject(skip)]
    tags: Vec<String>,
}

/// How the test logic should misbehave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Fault {
    #[default]
    None,
    StopInPreValidate,
    LogicConflict,
    ProcessError,
    Panic,
}

struct Catalogue {
    calls: Calls,
    fault: Fault,
}

impl Logic for Catalogue {
    type Body = Album;

    async fn process(
        &self,
        _ctx: &RequestContext,
        request: &mut WsRequest<Album>,
        response: &mut WsResponse,
    ) {
        record(&self.calls, "process");
        match self.fault {
            Fault::Panic => panic!("catalogue unavailable"),
            Fault::ProcessError => {
                response
                    .errors_mut()
                    .add_new_error(ServiceErrorCategory::Unexpected, "DB_DOWN", "Catalogue offline");
                response.set_body(json!({ "partial": true }));
            }
            _ => {
                let album = request.body().expect("body was unmarshalled");
                response.set_body(json!({
                    "title": album.title,
                    "artist": album.artist,
                    "year": album.year,
                    "tags": album.tags,
                }));
                response.set_header("X-Catalogue", "main");
            }
        }
    }

    fn as_unmarshal_target(&self) -> Option<&dyn UnmarshalTarget<Album>> {
        Some(self)
    }

    fn as_pre_validator(&self) -> Option<&dyn PreValidator<Album>> {
        Some(self)
    }

    fn as_validator(&self) -> Option<&dyn Validator<Album>> {
        Some(self)
    }

    fn as_post_processor(&self) -> Option<&dyn PostProcessor<Album>> {
        Some(self)
    }
}

impl UnmarshalTarget<Album> for Catalogue {
    fn unmarshal_target(&self, _ctx: &RequestContext) -> Album {
        record(&self.calls, "unmarshal_target");
        Album::default()
    }
}

impl PreValidator<Album> for Catalogue {
    fn pre_validate(
        &self,
        _ctx: &RequestContext,
        _request: &mut WsRequest<Album>,
        errors: &mut ServiceErrors,
    ) -> bool {
        record(&self.calls, "pre_validate");
        if self.fault == Fault::StopInPreValidate {
            errors.add_new_error(ServiceErrorCategory::Client, "NOT_NOW", "Try again later");
            return false;
        }
        true
    }
}

impl Validator<Album> for Catalogue {
    fn validate(&self, _ctx: &RequestContext, errors: &mut ServiceErrors, _request: &WsRequest<Album>) {
        record(&self.calls, "validate");
        if self.fault == Fault::LogicConflict {
            errors.add_new_error(ServiceErrorCategory::Logic, "DUPLICATE", "Album already exists");
        }
    }
}

impl PostProcessor<Album> for Catalogue {
    fn post_process(
        &self,
        _ctx: &RequestContext,
        handler_name: &str,
        _request: &WsRequest<Album>,
        response: &mut WsResponse,
    ) {
        record(&self.calls, "post_process");
        response.set_header("X-Handler", handler_name);
    }
}

struct RecordingIdentifier(Calls);

impl Identifier for RecordingIdentifier {
    fn identify(&self, _ctx: &RequestContext, request: &RequestHead) -> ClientIdentity {
        record(&self.0, "identify");
        match request.headers().get("x-user").and_then(|v| v.to_str().ok()) {
            Some(user) => ClientIdentity::authenticated(user),
            None => ClientIdentity::anonymous(),
        }
    }
}

struct RecordingAccessChecker(Calls);

impl AccessChecker for RecordingAccessChecker {
    fn allowed(&self, _ctx: &RequestContext, _request: &RequestHead, identity: &ClientIdentity) -> bool {
        record(&self.0, "access");
        identity.loggable_user_id() != "mallory"
    }
}

struct Ping {
    calls: Calls,
}

impl Logic for Ping {
    type Body = ();

    async fn process(
        &self,
        _ctx: &RequestContext,
        _request: &mut WsRequest<()>,
        response: &mut WsResponse,
    ) {
        record(&self.calls, "process");
        response.set_body(json!("pong"));
    }
}

fn catalogue_handler(fault: Fault) -> (WsHandler<Catalogue>, Calls) {
    let calls = Calls::default();
    let finder = ServiceErrorManager::builder()
        .define(ServiceErrorCategory::Client, "NO_TITLE", "A title is required")
        .define(ServiceErrorCategory::Client, "BAD_YEAR", "Year is out of range")
        .build()
        .unwrap();
    let rules = ValidatorBuilder::new("INVALID")
        .build::<Album>(&[
            FieldRule::new("title", ["REQ:NO_TITLE"]),
            FieldRule::new("year", ["RANGE:1900-2100:BAD_YEAR"]),
        ])
        .unwrap();

    let handler = WsHandler::builder(
        "create-album",
        Catalogue {
            calls: Arc::clone(&calls),
            fault,
        },
    )
    .json_body()
    .error_finder(Arc::new(finder))
    .identifier(Arc::new(RecordingIdentifier(Arc::clone(&calls))))
    .access_checker(Arc::new(RecordingAccessChecker(Arc::clone(&calls))))
    .path_pattern(r"^/artists/([^/]+)/albums$")
    .bind_path(["artist"])
    .bind_query([("tags", "tag")])
    .auto_bind_query(true)
    .validate_with(rules)
    .build()
    .unwrap();

    (handler, calls)
}

fn request(uri: &str, body: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user", "ada")
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

async fn call<L: Logic>(handler: &WsHandler<L>, req: http::Request<Bytes>) -> (StatusCode, Value, HttpResponseWriter) {
    let mut sink = HttpResponseWriter::new();
    handler.serve(RequestContext::new(), &mut sink, req).await.unwrap();
    let status = sink.status().unwrap();
    let body = if sink.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(sink.body()).unwrap()
    };
    (status, body, sink)
}

#[test]
fn test_capabilities_are_detected() {
    let ping = Ping { calls: Calls::default() };
    assert_eq!(PhaseCapabilities::detect(&ping), PhaseCapabilities::default());

    let (handler, _) = catalogue_handler(Fault::None);
    let caps = handler.capabilities();
    assert!(caps.unmarshal_target && caps.pre_validate && caps.validate && caps.post_process);
}

#[tokio::test]
async fn test_process_only_logic() {
    let calls = Calls::default();
    let handler = WsHandler::builder("ping", Ping { calls: Arc::clone(&calls) })
        .build()
        .unwrap();

    let req = http::Request::builder().uri("/ping").body(Bytes::new()).unwrap();
    let (status, body, _) = call(&handler, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "pong" }));
    assert_eq!(recorded(&calls), ["process"]);
}

#[tokio::test]
async fn test_all_phases_run_once_in_order() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let (status, body, sink) = call(
        &handler,
        request(
            "/artists/coltrane/albums?year=1957&tag=jazz&tag=hard-bop",
            r#"{"title": "Blue Train"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        recorded(&calls),
        [
            "identify",
            "access",
            "unmarshal_target",
            "pre_validate",
            "validate",
            "process",
            "post_process",
        ]
    );
    assert_eq!(
        body["response"],
        json!({
            "title": "Blue Train",
            "artist": "coltrane",
            "year": 1957,
            "tags": ["jazz", "hard-bop"],
        })
    );
    assert!(body.get("errors").is_none());
    assert_eq!(sink.headers()["x-catalogue"], "main");
    assert_eq!(sink.headers()["x-handler"], "create-album");
}

#[tokio::test]
async fn test_malformed_body_stops_after_unmarshal() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let (status, body, _) = call(&handler, request("/artists/coltrane/albums", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(recorded(&calls), ["identify", "access", "unmarshal_target"]);
    let code = body["errors"]["general"][0]["code"].as_str().unwrap();
    assert!(code.starts_with("C-"));
    assert!(body.get("response").is_none());
}

#[tokio::test]
async fn test_query_bind_failure_stops_before_pre_validate() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let (status, body, _) = call(
        &handler,
        request("/artists/coltrane/albums?year=soon", r#"{"title": "Blue Train"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(recorded(&calls), ["identify", "access", "unmarshal_target"]);
    assert!(body["errors"]["by_field"]["year"].is_array());
}

#[tokio::test]
async fn test_access_denied() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let mut req = request("/artists/coltrane/albums", "{}");
    req.headers_mut().insert("x-user", "mallory".parse().unwrap());
    let (status, body, _) = call(&handler, req).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(recorded(&calls), ["identify", "access"]);
    assert_eq!(body["errors"]["general"][0]["code"], "H-403");
}

#[tokio::test]
async fn test_pre_validate_can_stop_processing() {
    let (handler, calls) = catalogue_handler(Fault::StopInPreValidate);

    let (status, body, _) = call(&handler, request("/artists/coltrane/albums", r#"{"title": "x"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        recorded(&calls),
        ["identify", "access", "unmarshal_target", "pre_validate"]
    );
    assert_eq!(body["errors"]["general"][0]["code"], "C-NOT_NOW");
}

#[tokio::test]
async fn test_rule_failures_skip_process_but_post_process() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let (status, body, sink) = call(
        &handler,
        request("/artists/coltrane/albums?year=1800", r#"{"title": ""}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        recorded(&calls),
        [
            "identify",
            "access",
            "unmarshal_target",
            "pre_validate",
            "validate",
            "post_process",
        ]
    );
    assert_eq!(body["errors"]["by_field"]["title"][0]["code"], "C-NO_TITLE");
    assert_eq!(body["errors"]["by_field"]["year"][0]["code"], "C-BAD_YEAR");
    assert_eq!(sink.headers()["x-handler"], "create-album");
}

#[tokio::test]
async fn test_logic_validation_conflict() {
    let (handler, _) = catalogue_handler(Fault::LogicConflict);

    let (status, body, _) = call(
        &handler,
        request("/artists/coltrane/albums", r#"{"title": "Blue Train"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"]["general"][0]["code"], "L-DUPLICATE");
}

#[tokio::test]
async fn test_process_errors_drop_body() {
    let (handler, calls) = catalogue_handler(Fault::ProcessError);

    let (status, body, _) = call(
        &handler,
        request("/artists/coltrane/albums", r#"{"title": "Blue Train"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(recorded(&calls).last(), Some(&"post_process"));
    assert!(body.get("response").is_none());
    assert_eq!(body["errors"]["general"][0]["code"], "U-DB_DOWN");
    assert_eq!(body["errors"]["general"][0]["message"], "HTTP 500");
    assert!(!body.to_string().contains("Catalogue offline"));
}

#[tokio::test]
async fn test_panic_is_abnormal() {
    let (handler, calls) = catalogue_handler(Fault::Panic);

    let (status, body, sink) = call(
        &handler,
        request("/artists/coltrane/albums", r#"{"title": "Blue Train"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(recorded(&calls).last(), Some(&"process"));
    assert_eq!(body["errors"]["general"][0]["code"], "H-500");
    assert!(sink.headers().get("x-handler").is_none());
}

#[tokio::test]
async fn test_write_is_skipped_when_data_already_sent() {
    let (handler, calls) = catalogue_handler(Fault::None);

    let mut sink = HttpResponseWriter::new();
    sink.write_status(StatusCode::ACCEPTED);
    handler
        .serve(
            RequestContext::new(),
            &mut sink,
            request("/artists/coltrane/albums", r#"{"title": "Blue Train"}"#),
        )
        .await
        .unwrap();

    assert_eq!(sink.status(), Some(StatusCode::ACCEPTED));
    assert!(sink.body().is_empty());
    assert_eq!(recorded(&calls).last(), Some(&"post_process"));
}

#[test]
fn test_outcome_names() {
    assert_eq!(WsOutcome::Normal.as_str(), "normal");
    assert_eq!(WsOutcome::Error.to_string(), "error");
    assert_eq!(WsOutcome::Abnormal.as_str(), "abnormal");
}
