//! JSON implementations of the response-writing capabilities.

use crate::error::WriteError;
use crate::sink::HttpResponseWriter;
use crate::writer::{ErrorFormatter, MarshalingWriter, ResponseWrapper};
use hypatia_core::{CategorisedError, ServiceErrors};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Content type set when no other has been configured.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serialises values as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonMarshalingWriter {
    pretty_print: bool,
    indent: String,
}

impl Default for JsonMarshalingWriter {
    fn default() -> Self {
        Self {
            pretty_print: false,
            indent: "  ".to_string(),
        }
    }
}

impl JsonMarshalingWriter {
    /// Creates a compact writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that indents nested values with `indent`.
    #[must_use]
    pub fn pretty(indent: impl Into<String>) -> Self {
        Self {
            pretty_print: true,
            indent: indent.into(),
        }
    }

    fn to_bytes(&self, data: &Value) -> Result<Vec<u8>, serde_json::Error> {
        if !self.pretty_print {
            return serde_json::to_vec(data);
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        data.serialize(&mut serializer)?;
        Ok(buf)
    }
}

impl MarshalingWriter for JsonMarshalingWriter {
    fn marshal_and_write(
        &self,
        data: &Value,
        sink: &mut HttpResponseWriter,
    ) -> Result<(), WriteError> {
        let bytes = self.to_bytes(data)?;
        if !sink.headers().contains_key(http::header::CONTENT_TYPE) {
            sink.set_header(http::header::CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE);
        }
        sink.write(&bytes);
        Ok(())
    }
}

/// Formats errors as general errors and errors grouped by field.
///
/// ```json
/// {
///   "general": [{"code": "U-UNKNOWN_ERROR_CODE", "message": "..."}],
///   "by_field": {"title": [{"code": "C-NO_TITLE", "message": "..."}]}
/// }
/// ```
///
/// Codes are prefixed with the category letter. Empty sections are omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorFormatter;

fn error_entry(error: &CategorisedError) -> Value {
    json!({
        "code": format!("{}-{}", error.category().letter(), error.code()),
        "message": error.message(),
    })
}

impl ErrorFormatter for JsonErrorFormatter {
    fn format_errors(&self, errors: &ServiceErrors) -> Option<Value> {
        if !errors.has_errors() {
            return None;
        }

        let mut general = Vec::new();
        let mut by_field: Map<String, Value> = Map::new();

        for error in errors {
            match error.field() {
                Some(field) => {
                    let entries = by_field
                        .entry(field.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(entries) = entries {
                        entries.push(error_entry(error));
                    }
                }
                None => general.push(error_entry(error)),
            }
        }

        let mut formatted = Map::new();
        if !general.is_empty() {
            formatted.insert("general".to_string(), Value::Array(general));
        }
        if !by_field.is_empty() {
            formatted.insert("by_field".to_string(), Value::Object(by_field));
        }
        Some(Value::Object(formatted))
    }
}

/// Wraps the body and errors in an object with configurable keys.
///
/// Absent parts are omitted, so a successful response is
/// `{"response": ...}` and a failed one `{"errors": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponseWrapper {
    body_field: String,
    errors_field: String,
}

impl Default for JsonResponseWrapper {
    fn default() -> Self {
        Self::new("response", "errors")
    }
}

impl JsonResponseWrapper {
    /// Creates a wrapper using the given keys.
    #[must_use]
    pub fn new(body_field: impl Into<String>, errors_field: impl Into<String>) -> Self {
        Self {
            body_field: body_field.into(),
            errors_field: errors_field.into(),
        }
    }
}

impl ResponseWrapper for JsonResponseWrapper {
    fn wrap_response(&self, body: Option<&Value>, errors: Option<Value>) -> Value {
        let mut wrapper = Map::new();
        if let Some(body) = body {
            wrapper.insert(self.body_field.clone(), body.clone());
        }
        if let Some(errors) = errors {
            wrapper.insert(self.errors_field.clone(), errors);
        }
        Value::Object(wrapper)
    }
}

/// Sends the errors if there are any, otherwise the body unwrapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyOrErrorWrapper;

impl ResponseWrapper for BodyOrErrorWrapper {
    fn wrap_response(&self, body: Option<&Value>, errors: Option<Value>) -> Value {
        match errors {
            Some(errors) => errors,
            None => body.cloned().unwrap_or(Value::Null),
        }
    }
}
