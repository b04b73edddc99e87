//! Framework errors.
//!
//! A framework error is a failure detected before application logic runs:
//! the request body could not be parsed, or a path or query parameter could
//! not be bound to the request body. Framework errors are converted to
//! generic client-facing [`CategorisedError`]s by a [`FrameworkErrorGenerator`]
//! while keeping the phase and field information for diagnostics.

use crate::error::{CategorisedError, ServiceErrorCategory};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The phase of request processing in which a framework error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkPhase {
    /// Parsing the request body.
    Unmarshal,
    /// Binding query parameters.
    QueryBind,
    /// Binding path segments.
    PathBind,
}

impl FrameworkPhase {
    /// Returns the phase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unmarshal => "unmarshal",
            Self::QueryBind => "query_bind",
            Self::PathBind => "path_bind",
        }
    }
}

impl fmt::Display for FrameworkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure to parse or bind a request before application logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} failed [{code}]: {message}")]
pub struct WsFrameworkError {
    /// The phase that failed.
    pub phase: FrameworkPhase,
    /// The name of the parameter as supplied by the caller.
    pub client_field: Option<String>,
    /// The name of the field on the request body.
    pub target_field: Option<String>,
    /// A client-safe description of the failure.
    pub message: String,
    /// The raw value that could not be bound.
    pub value: Option<String>,
    /// The position of a path segment, for path binding failures.
    pub position: Option<usize>,
    /// The code of the failure.
    pub code: String,
}

impl WsFrameworkError {
    /// Creates an error for a request body that could not be parsed.
    #[must_use]
    pub fn unmarshal(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            phase: FrameworkPhase::Unmarshal,
            client_field: None,
            target_field: None,
            message: message.into(),
            value: None,
            position: None,
            code: code.into(),
        }
    }

    /// Creates an error for a query parameter that could not be bound.
    #[must_use]
    pub fn query_bind(
        message: impl Into<String>,
        code: impl Into<String>,
        param: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            phase: FrameworkPhase::QueryBind,
            client_field: Some(param.into()),
            target_field: Some(target.into()),
            message: message.into(),
            value: None,
            position: None,
            code: code.into(),
        }
    }

    /// Creates an error for a path segment that could not be bound.
    #[must_use]
    pub fn path_bind(
        message: impl Into<String>,
        code: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            phase: FrameworkPhase::PathBind,
            client_field: None,
            target_field: Some(target.into()),
            message: message.into(),
            value: None,
            position: None,
            code: code.into(),
        }
    }

    /// Records the offending raw value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Records the position of the offending path segment.
    #[must_use]
    pub const fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Converts this error into a client-category service error, attributed
    /// to the client field if known, otherwise to the target field.
    #[must_use]
    pub fn to_categorised(&self) -> CategorisedError {
        let error = CategorisedError::new(
            ServiceErrorCategory::Client,
            self.code.clone(),
            self.message.clone(),
        );
        match self.client_field.as_ref().or(self.target_field.as_ref()) {
            Some(field) => error.with_field(field.clone()),
            None => error,
        }
    }
}

/// The kinds of framework failure that have a configurable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkErrorEvent {
    /// The request body could not be parsed.
    UnableToParseRequest,
    /// A query parameter was supplied more than once for a field that is not a list.
    QueryTargetNotArray,
    /// A query parameter could not be converted to the type of its target field.
    QueryWrongType,
    /// A path segment could not be converted to the type of its target field.
    PathWrongType,
    /// A query parameter was mapped to a field that does not exist.
    QueryNoTargetField,
}

impl FrameworkErrorEvent {
    /// Returns every event.
    #[must_use]
    pub const fn all() -> &'static [FrameworkErrorEvent] {
        &[
            Self::UnableToParseRequest,
            Self::QueryTargetNotArray,
            Self::QueryWrongType,
            Self::PathWrongType,
            Self::QueryNoTargetField,
        ]
    }

    fn default_message(self) -> FrameworkMessage {
        match self {
            Self::UnableToParseRequest => FrameworkMessage::new(
                "FRAMEWORK_UNPARSEABLE",
                "The request body could not be parsed.",
            ),
            Self::QueryTargetNotArray => FrameworkMessage::new(
                "FRAMEWORK_QUERY_NOT_ARRAY",
                "Parameter {} was supplied more than once but only accepts a single value.",
            ),
            Self::QueryWrongType => FrameworkMessage::new(
                "FRAMEWORK_QUERY_WRONG_TYPE",
                "Parameter {} could not be interpreted as {}.",
            ),
            Self::PathWrongType => FrameworkMessage::new(
                "FRAMEWORK_PATH_WRONG_TYPE",
                "Path segment {} could not be interpreted as {}.",
            ),
            Self::QueryNoTargetField => FrameworkMessage::new(
                "FRAMEWORK_QUERY_NO_TARGET",
                "Parameter {} cannot be accepted by this service.",
            ),
        }
    }
}

/// The code and message template for a framework error event.
///
/// Deserializes from a two-element array: `["CODE", "template {}"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct FrameworkMessage {
    /// The code given to the resulting error.
    pub code: String,
    /// The message template; each `{}` is replaced by the next argument.
    pub template: String,
}

impl FrameworkMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(code: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            template: template.into(),
        }
    }
}

impl From<(String, String)> for FrameworkMessage {
    fn from((code, template): (String, String)) -> Self {
        Self { code, template }
    }
}

impl From<FrameworkMessage> for (String, String) {
    fn from(m: FrameworkMessage) -> Self {
        (m.code, m.template)
    }
}

const UNDEFINED_CODE: &str = "UNKNOWN";
const UNDEFINED_MESSAGE: &str = "No error message defined for this error";

/// Builds client-facing errors for framework failures and HTTP statuses.
#[derive(Debug, Clone)]
pub struct FrameworkErrorGenerator {
    messages: HashMap<FrameworkErrorEvent, FrameworkMessage>,
    http_messages: HashMap<u16, String>,
}

impl Default for FrameworkErrorGenerator {
    fn default() -> Self {
        let messages = FrameworkErrorEvent::all()
            .iter()
            .map(|e| (*e, e.default_message()))
            .collect();

        Self {
            messages,
            http_messages: HashMap::new(),
        }
    }
}

impl FrameworkErrorGenerator {
    /// Creates a generator with the built-in messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator with no messages defined.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            messages: HashMap::new(),
            http_messages: HashMap::new(),
        }
    }

    /// Overrides the message for an event.
    #[must_use]
    pub fn with_message(mut self, event: FrameworkErrorEvent, message: FrameworkMessage) -> Self {
        self.messages.insert(event, message);
        self
    }

    /// Sets the message used for an HTTP status.
    #[must_use]
    pub fn with_http_message(mut self, status: StatusCode, template: impl Into<String>) -> Self {
        self.http_messages.insert(status.as_u16(), template.into());
        self
    }

    /// Builds the error for `event` in the given category.
    ///
    /// An event with no message yields code `UNKNOWN` and a generic message.
    #[must_use]
    pub fn error(
        &self,
        event: FrameworkErrorEvent,
        category: ServiceErrorCategory,
        args: &[&str],
    ) -> CategorisedError {
        let (message, code) = self.message_code(event, args);
        CategorisedError::new(category, code, message)
    }

    /// Returns the formatted message and the code for `event`.
    #[must_use]
    pub fn message_code(&self, event: FrameworkErrorEvent, args: &[&str]) -> (String, String) {
        match self.messages.get(&event) {
            Some(m) => (fill_template(&m.template, args), m.code.clone()),
            None => {
                tracing::warn!(
                    target: "hypatia::framework",
                    ?event,
                    "No framework error message defined, returning a default message"
                );
                (UNDEFINED_MESSAGE.to_string(), UNDEFINED_CODE.to_string())
            }
        }
    }

    /// Builds an HTTP-category error for `status`.
    ///
    /// The code is the numeric status. The message is the configured message
    /// for the status or `HTTP <status>`.
    #[must_use]
    pub fn http_error(&self, status: StatusCode) -> CategorisedError {
        let code = status.as_u16().to_string();
        let message = self
            .http_messages
            .get(&status.as_u16())
            .cloned()
            .unwrap_or_else(|| format!("HTTP {code}"));

        CategorisedError::new(ServiceErrorCategory::Http, code, message)
    }
}

/// Replaces each `{}` in `template` with the next argument.
///
/// Placeholders beyond the supplied arguments are left untouched.
fn fill_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}
