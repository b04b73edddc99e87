//! Service error types.
//!
//! Errors detected during or after request binding are recorded as
//! [`CategorisedError`]s in a request-scoped [`ServiceErrors`] collection.
//! The category of each error drives the HTTP status of the response:
//!
//! | Category | Letter | Status |
//! |---|---|---|
//! | `Unexpected` | `U` | 500 |
//! | `Http` | `H` | the error's code, parsed as a status |
//! | `Security` | `S` | 401 |
//! | `Client` | `C` | 400 |
//! | `Logic` | `L` | 409 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Code given to an error whose predefined definition could not be found.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR_CODE";

/// Errors raised by the core types themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A category name or letter was not recognised.
    #[error("unknown service error category '{0}'")]
    UnknownCategory(String),

    /// Two error definitions share the same code.
    #[error("service error code '{0}' is defined more than once")]
    DuplicateErrorCode(String),

    /// A field path could not be parsed.
    #[error("invalid field path '{path}': {reason}")]
    InvalidFieldPath {
        /// The path as written.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// The broad type of a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ServiceErrorCategory {
    /// An unhandled problem inside the service. Always collapses to HTTP 500.
    Unexpected,
    /// An error expressed directly as an HTTP status.
    Http,
    /// An authentication or authorisation failure.
    Security,
    /// A problem with the caller's request.
    Client,
    /// A business-rule violation.
    Logic,
}

impl ServiceErrorCategory {
    /// Returns all categories in status-determination priority order.
    #[must_use]
    pub const fn all() -> &'static [ServiceErrorCategory] {
        &[
            Self::Unexpected,
            Self::Http,
            Self::Security,
            Self::Client,
            Self::Logic,
        ]
    }

    /// Returns the single-letter abbreviation used in configuration and error output.
    #[must_use]
    pub const fn letter(&self) -> &'static str {
        match self {
            Self::Unexpected => "U",
            Self::Http => "H",
            Self::Security => "S",
            Self::Client => "C",
            Self::Logic => "L",
        }
    }

    /// Returns the canonical name of the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unexpected => "unexpected",
            Self::Http => "http",
            Self::Security => "security",
            Self::Client => "client",
            Self::Logic => "logic",
        }
    }
}

impl fmt::Display for ServiceErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceErrorCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u" | "unexpected" => Ok(Self::Unexpected),
            "h" | "http" => Ok(Self::Http),
            "s" | "security" => Ok(Self::Security),
            "c" | "client" => Ok(Self::Client),
            "l" | "logic" => Ok(Self::Logic),
            _ => Err(CoreError::UnknownCategory(s.to_string())),
        }
    }
}

impl TryFrom<String> for ServiceErrorCategory {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A service error with a category, a machine-readable code and a message.
///
/// Errors may optionally be attributed to a field of the request body, which
/// lets error formatters group validation failures by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorisedError {
    category: ServiceErrorCategory,
    code: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl CategorisedError {
    /// Creates a new error.
    #[must_use]
    pub fn new(
        category: ServiceErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    /// Returns a copy of this error attributed to the named field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Returns the category.
    #[must_use]
    pub const fn category(&self) -> ServiceErrorCategory {
        self.category
    }

    /// Returns the code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the field this error is attributed to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Replaces the message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }
}

impl fmt::Display for CategorisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}: {}", self.category.letter(), self.code, self.message)
    }
}

/// Resolves error codes to predefined errors.
pub trait ServiceErrorFinder: Send + Sync {
    /// Returns the error defined for `code`, if any.
    fn find(&self, code: &str) -> Option<CategorisedError>;
}

/// A predefined error as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceErrorDefinition {
    /// Category of the error, either a letter (`C`) or a name (`client`).
    pub category: ServiceErrorCategory,
    /// Code the error is looked up by.
    pub code: String,
    /// Message presented to the caller.
    pub message: String,
}

/// A [`ServiceErrorFinder`] backed by a table of predefined errors.
///
/// # Example
///
/// ```
/// use hypatia_core::{ServiceErrorCategory, ServiceErrorFinder, ServiceErrorManager};
///
/// let manager = ServiceErrorManager::builder()
///     .define(ServiceErrorCategory::Client, "NO_NAME", "A name is required.")
///     .build()
///     .unwrap();
///
/// let error = manager.find("NO_NAME").unwrap();
/// assert_eq!(error.category(), ServiceErrorCategory::Client);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServiceErrorManager {
    errors: HashMap<String, CategorisedError>,
}

impl ServiceErrorManager {
    /// Creates a manager with no definitions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ServiceErrorManagerBuilder {
        ServiceErrorManagerBuilder::default()
    }

    /// Creates a manager from configuration definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ServiceErrorDefinition>,
    ) -> Result<Self, CoreError> {
        definitions
            .into_iter()
            .fold(Self::builder(), |b, d| b.define(d.category, d.code, d.message))
            .build()
    }

    /// Returns the number of defined errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no errors are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ServiceErrorFinder for ServiceErrorManager {
    fn find(&self, code: &str) -> Option<CategorisedError> {
        self.errors.get(code).cloned()
    }
}

/// Builder for [`ServiceErrorManager`].
#[derive(Debug, Default)]
pub struct ServiceErrorManagerBuilder {
    definitions: Vec<CategorisedError>,
}

impl ServiceErrorManagerBuilder {
    /// Adds a predefined error.
    #[must_use]
    pub fn define(
        mut self,
        category: ServiceErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.definitions
            .push(CategorisedError::new(category, code, message));
        self
    }

    /// Builds the manager, rejecting duplicate codes.
    pub fn build(self) -> Result<ServiceErrorManager, CoreError> {
        let mut errors = HashMap::with_capacity(self.definitions.len());
        for error in self.definitions {
            if errors.contains_key(error.code()) {
                return Err(CoreError::DuplicateErrorCode(error.code));
            }
            errors.insert(error.code.clone(), error);
        }
        Ok(ServiceErrorManager { errors })
    }
}

/// The ordered collection of errors recorded while processing one request.
///
/// Errors are reported in the order they were added. An explicit HTTP status
/// may be set to override status determination.
#[derive(Clone, Default)]
pub struct ServiceErrors {
    errors: Vec<CategorisedError>,
    http_status: Option<StatusCode>,
    finder: Option<Arc<dyn ServiceErrorFinder>>,
}

impl ServiceErrors {
    /// Creates an empty collection with no error finder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection that resolves predefined errors through `finder`.
    #[must_use]
    pub fn with_finder(finder: Arc<dyn ServiceErrorFinder>) -> Self {
        Self {
            errors: Vec::new(),
            http_status: None,
            finder: Some(finder),
        }
    }

    /// Returns the error finder, if one is attached.
    #[must_use]
    pub fn finder(&self) -> Option<&Arc<dyn ServiceErrorFinder>> {
        self.finder.as_ref()
    }

    /// Appends an error.
    pub fn add_error(&mut self, error: CategorisedError) {
        self.errors.push(error);
    }

    /// Creates and appends an error.
    pub fn add_new_error(
        &mut self,
        category: ServiceErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.add_error(CategorisedError::new(category, code, message));
    }

    /// Appends the predefined error registered under `code`.
    ///
    /// A code that cannot be resolved is recorded as an `Unexpected` error with
    /// code [`UNKNOWN_ERROR_CODE`].
    pub fn add_predefined_error(&mut self, code: &str) {
        let error = self.resolve(code);
        self.add_error(error);
    }

    /// Appends the predefined error registered under `code`, attributed to `field`.
    pub fn add_predefined_error_for_field(&mut self, code: &str, field: &str) {
        let error = self.resolve(code).with_field(field);
        self.add_error(error);
    }

    fn resolve(&self, code: &str) -> CategorisedError {
        match self.finder.as_ref().and_then(|f| f.find(code)) {
            Some(error) => error,
            None => {
                tracing::warn!(
                    target: "hypatia::errors",
                    code,
                    "No predefined error found for code"
                );
                CategorisedError::new(
                    ServiceErrorCategory::Unexpected,
                    UNKNOWN_ERROR_CODE,
                    "No error is defined for the requested code",
                )
            }
        }
    }

    /// Appends every error from `other`, preserving order.
    pub fn extend(&mut self, other: impl IntoIterator<Item = CategorisedError>) {
        self.errors.extend(other);
    }

    /// Returns `true` if at least one error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no errors have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded errors in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[CategorisedError] {
        &self.errors
    }

    /// Returns an iterator over the recorded errors.
    pub fn iter(&self) -> std::slice::Iter<'_, CategorisedError> {
        self.errors.iter()
    }

    /// Returns a mutable iterator over the recorded errors.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CategorisedError> {
        self.errors.iter_mut()
    }

    /// Returns `true` if any error of the given category has been recorded.
    #[must_use]
    pub fn has_category(&self, category: ServiceErrorCategory) -> bool {
        self.errors.iter().any(|e| e.category == category)
    }

    /// Returns the first recorded error of the given category.
    #[must_use]
    pub fn first_of(&self, category: ServiceErrorCategory) -> Option<&CategorisedError> {
        self.errors.iter().find(|e| e.category == category)
    }

    /// Returns the explicit HTTP status, if set.
    #[must_use]
    pub const fn http_status(&self) -> Option<StatusCode> {
        self.http_status
    }

    /// Sets an explicit HTTP status that overrides category-based determination.
    pub fn set_http_status(&mut self, status: StatusCode) {
        self.http_status = Some(status);
    }
}

impl fmt::Debug for ServiceErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceErrors")
            .field("errors", &self.errors)
            .field("http_status", &self.http_status)
            .field("finder", &self.finder.is_some())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ServiceErrors {
    type Item = &'a CategorisedError;
    type IntoIter = std::slice::Iter<'a, CategorisedError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<ServiceErrorManager> {
        Arc::new(
            ServiceErrorManager::builder()
                .define(ServiceErrorCategory::Client, "NO_NAME", "A name is required.")
                .define(ServiceErrorCategory::Logic, "TAKEN", "That name is taken.")
                .build()
                .expect("definitions are unique"),
        )
    }

    #[test]
    fn test_category_parse_letters_and_names() {
        assert_eq!("U".parse::<ServiceErrorCategory>(), Ok(ServiceErrorCategory::Unexpected));
        assert_eq!("h".parse::<ServiceErrorCategory>(), Ok(ServiceErrorCategory::Http));
        assert_eq!("Security".parse::<ServiceErrorCategory>(), Ok(ServiceErrorCategory::Security));
        assert_eq!("client".parse::<ServiceErrorCategory>(), Ok(ServiceErrorCategory::Client));
        assert_eq!("L".parse::<ServiceErrorCategory>(), Ok(ServiceErrorCategory::Logic));
        assert!(matches!(
            "X".parse::<ServiceErrorCategory>(),
            Err(CoreError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_category_deserializes_from_letter() {
        let def: ServiceErrorDefinition =
            serde_json::from_str(r#"{"category":"C","code":"A","message":"m"}"#)
                .expect("valid definition");
        assert_eq!(def.category, ServiceErrorCategory::Client);
    }

    #[test]
    fn test_predefined_errors_are_resolved() {
        let mut errors = ServiceErrors::with_finder(manager());
        errors.add_predefined_error("TAKEN");
        errors.add_predefined_error_for_field("NO_NAME", "name");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.errors()[0].category(), ServiceErrorCategory::Logic);
        assert_eq!(errors.errors()[1].code(), "NO_NAME");
        assert_eq!(errors.errors()[1].field(), Some("name"));
    }

    #[test]
    fn test_unknown_code_becomes_unexpected() {
        let mut errors = ServiceErrors::with_finder(manager());
        errors.add_predefined_error("NOPE");
        let error = &errors.errors()[0];
        assert_eq!(error.category(), ServiceErrorCategory::Unexpected);
        assert_eq!(error.code(), UNKNOWN_ERROR_CODE);
        assert!(!error.message().contains("NOPE"));
    }

    #[test]
    fn test_missing_finder_becomes_unexpected() {
        let mut errors = ServiceErrors::new();
        errors.add_predefined_error("NO_NAME");
        assert!(errors.has_category(ServiceErrorCategory::Unexpected));
    }

    #[test]
    fn test_order_is_preserved() {
        let mut errors = ServiceErrors::new();
        errors.add_new_error(ServiceErrorCategory::Logic, "A", "a");
        errors.add_new_error(ServiceErrorCategory::Client, "B", "b");
        errors.add_new_error(ServiceErrorCategory::Logic, "C", "c");
        let codes: Vec<&str> = errors.iter().map(CategorisedError::code).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert_eq!(errors.first_of(ServiceErrorCategory::Logic).map(CategorisedError::code), Some("A"));
    }

    #[test]
    fn test_duplicate_definitions_rejected() {
        let result = ServiceErrorManager::builder()
            .define(ServiceErrorCategory::Client, "A", "a")
            .define(ServiceErrorCategory::Logic, "A", "b")
            .build();
        assert_eq!(result.unwrap_err(), CoreError::DuplicateErrorCode("A".to_string()));
    }

    #[test]
    fn test_display_uses_letter_prefix() {
        let error = CategorisedError::new(ServiceErrorCategory::Client, "BAD", "Bad input");
        assert_eq!(error.to_string(), "C-BAD: Bad input");
    }

    #[test]
    fn test_http_status_override() {
        let mut errors = ServiceErrors::new();
        assert!(errors.http_status().is_none());
        errors.set_http_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(errors.http_status(), Some(StatusCode::IM_A_TEAPOT));
    }
}
