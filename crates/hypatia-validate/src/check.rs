//! External checks.
//!
//! `EXT:<name>` delegates validation to an application-supplied
//! [`ExternalCheck`] registered by name in a [`CheckerRegistry`]. Names are
//! resolved when the validator is built. A check sees the value and a
//! [`CheckContext`] through which it can read the rest of the subject.

use hypatia_core::{FieldKind, FieldPath, FieldValue, Subject};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A checker that could not reach a verdict.
///
/// Treated as a failure of the field being checked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("external check failed: {message}")]
pub struct CheckError {
    message: String,
}

impl CheckError {
    /// Creates an error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The field under check and the subject it belongs to.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    field: &'a FieldPath,
    subject: &'a dyn Subject,
}

impl<'a> CheckContext<'a> {
    /// Creates a context for checking `field` of `subject`.
    #[must_use]
    pub fn new(field: &'a FieldPath, subject: &'a dyn Subject) -> Self {
        Self { field, subject }
    }

    /// Returns the path of the field being checked.
    #[must_use]
    pub const fn field(&self) -> &'a FieldPath {
        self.field
    }

    /// Returns the subject being validated.
    #[must_use]
    pub fn subject(&self) -> &'a dyn Subject {
        self.subject
    }

    /// Returns the value of another field of the subject.
    ///
    /// A malformed or unknown path reads as [`FieldValue::Absent`].
    #[must_use]
    pub fn value_at(&self, path: &str) -> FieldValue<'a> {
        match FieldPath::parse(path) {
            Ok(path) => self.subject.field_value(path.segments()),
            Err(_) => FieldValue::Absent,
        }
    }
}

impl fmt::Debug for CheckContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckContext")
            .field("field", &self.field.as_str())
            .finish_non_exhaustive()
    }
}

/// An application-supplied validation check.
pub trait ExternalCheck: Send + Sync {
    /// Returns `true` if the check can be applied to fields of `kind`.
    fn supports(&self, kind: FieldKind) -> bool {
        let _ = kind;
        true
    }

    /// Returns `Ok(true)` if `value`, the current value of `ctx.field()`, is
    /// valid.
    ///
    /// Only called for present values.
    fn check(&self, ctx: &CheckContext<'_>, value: &FieldValue<'_>) -> Result<bool, CheckError>;
}

/// An [`ExternalCheck`] built from a closure.
///
/// # Example
///
/// ```
/// use hypatia_core::{FieldKind, FieldValue};
/// use hypatia_validate::{ExternalCheck, FnChecker};
///
/// let even = FnChecker::new(|_, v: &FieldValue<'_>| Ok(matches!(v, FieldValue::Int(i) if i % 2 == 0)))
///     .for_kinds(&[FieldKind::Int32, FieldKind::Int64]);
///
/// assert!(even.supports(FieldKind::Int64));
/// assert!(!even.supports(FieldKind::String));
/// ```
pub struct FnChecker<F> {
    check: F,
    kinds: Option<Vec<FieldKind>>,
}

impl<F> FnChecker<F>
where
    F: Fn(&CheckContext<'_>, &FieldValue<'_>) -> Result<bool, CheckError> + Send + Sync,
{
    /// Wraps a closure that accepts every kind.
    #[must_use]
    pub const fn new(check: F) -> Self {
        Self { check, kinds: None }
    }

    /// Restricts the kinds the checker supports.
    #[must_use]
    pub fn for_kinds(mut self, kinds: &[FieldKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }
}

impl<F> ExternalCheck for FnChecker<F>
where
    F: Fn(&CheckContext<'_>, &FieldValue<'_>) -> Result<bool, CheckError> + Send + Sync,
{
    fn supports(&self, kind: FieldKind) -> bool {
        self.kinds.as_ref().map_or(true, |k| k.contains(&kind))
    }

    fn check(&self, ctx: &CheckContext<'_>, value: &FieldValue<'_>) -> Result<bool, CheckError> {
        (self.check)(ctx, value)
    }
}

/// Named external checkers available to `EXT` operations.
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn ExternalCheck>>,
}

impl CheckerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a checker, replacing any checker with the same name.
    pub fn register(&mut self, name: impl Into<String>, checker: impl ExternalCheck + 'static) {
        self.checkers.insert(name.into(), Arc::new(checker));
    }

    /// Returns the registry with the checker added.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, checker: impl ExternalCheck + 'static) -> Self {
        self.register(name, checker);
        self
    }

    /// Looks up a checker by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExternalCheck>> {
        self.checkers.get(name).cloned()
    }

    /// Returns the number of registered checkers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Returns `true` if no checkers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CheckerRegistry")
            .field("checkers", &names)
            .finish()
    }
}
