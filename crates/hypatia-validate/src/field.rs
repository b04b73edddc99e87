//! Per-field validators and their evaluation.

use crate::check::CheckContext;
use crate::rule::{Operation, Rule};
use hypatia_core::{FieldKind, FieldPath, FieldValue, Subject};
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Per-call state for evaluating one field of a subject.
#[derive(Debug)]
pub struct ValidationContext<'s, T> {
    subject: &'s T,
    codes: Vec<String>,
    stop_all: bool,
}

impl<'s, T: Subject> ValidationContext<'s, T> {
    /// Creates a context for validating `subject`.
    #[must_use]
    pub const fn new(subject: &'s T) -> Self {
        Self {
            subject,
            codes: Vec::new(),
            stop_all: false,
        }
    }

    /// Returns the subject under validation.
    #[must_use]
    pub const fn subject(&self) -> &'s T {
        self.subject
    }

    /// Returns `true` if an operation has failed so far.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        !self.codes.is_empty()
    }

    fn fail(&mut self, code: &str) {
        self.codes.push(code.to_string());
    }

    /// Consumes the context, producing the result for `field`.
    #[must_use]
    pub fn into_result(self, field: &str) -> ValidationResult {
        ValidationResult {
            field: field.to_string(),
            codes: self.codes,
            stop_all: self.stop_all,
        }
    }
}

/// The outcome of evaluating one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    field: String,
    codes: Vec<String>,
    stop_all: bool,
}

impl ValidationResult {
    /// Returns the path of the evaluated field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the codes of the failed operations, in evaluation order.
    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Returns `true` if no operation failed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.codes.is_empty()
    }

    /// Returns `true` if a `STOPALL` halted validation of later fields.
    #[must_use]
    pub const fn stops_all(&self) -> bool {
        self.stop_all
    }
}

/// A rule bound to a field path and the field's declared kind.
///
/// Built once and shared read-only between concurrent validations.
#[derive(Debug)]
pub struct FieldValidator<T> {
    path: FieldPath,
    kind: FieldKind,
    rule: Rule,
    _subject: PhantomData<fn(&T)>,
}

impl<T> Clone for FieldValidator<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind,
            rule: self.rule.clone(),
            _subject: PhantomData,
        }
    }
}

impl<T: Subject> FieldValidator<T> {
    pub(crate) const fn new(path: FieldPath, kind: FieldKind, rule: Rule) -> Self {
        Self {
            path,
            kind,
            rule,
            _subject: PhantomData,
        }
    }

    /// Returns the field path.
    #[must_use]
    pub const fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Returns the declared kind of the field.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns the parsed rule.
    #[must_use]
    pub const fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Validates the field of `subject`.
    #[must_use]
    pub fn validate(&self, subject: &T) -> ValidationResult {
        let mut ctx = ValidationContext::new(subject);
        self.evaluate(&mut ctx);
        ctx.into_result(self.path.as_str())
    }

    /// Runs the rule's operations against the field, recording failures in `ctx`.
    pub fn evaluate(&self, ctx: &mut ValidationContext<'_, T>) {
        let value = ctx.subject.field_value(self.path.segments());

        match self.rule.required_code() {
            Some(code) => {
                let missing = if self.kind.is_nilable() {
                    value == FieldValue::Absent
                } else {
                    value.is_absent_or_zero()
                };
                if missing {
                    ctx.fail(code);
                    return;
                }
            }
            None if value == FieldValue::Absent => return,
            None => {}
        }

        let check_ctx = CheckContext::new(&self.path, ctx.subject);
        for op in self.rule.operations() {
            match op {
                Operation::Required { .. } => {}
                Operation::Break => {
                    if ctx.has_failed() {
                        break;
                    }
                }
                Operation::StopAll => {
                    if ctx.has_failed() {
                        ctx.stop_all = true;
                        break;
                    }
                }
                _ => {
                    if !self.check(op, &check_ctx, &value) {
                        if let Some(code) = op.code() {
                            ctx.fail(code);
                        }
                    }
                }
            }
        }
    }

    /// Returns `true` if `value` satisfies `op`.
    fn check(&self, op: &Operation, ctx: &CheckContext<'_>, value: &FieldValue<'_>) -> bool {
        match op {
            Operation::In { set, .. } => set.iter().any(|l| l.compare(value) == Some(Ordering::Equal)),
            Operation::Range { min, max, .. } => {
                let above_min = min.as_ref().map_or(true, |m| {
                    matches!(m.compare(value), Some(Ordering::Greater | Ordering::Equal))
                });
                let below_max = max.as_ref().map_or(true, |m| {
                    matches!(m.compare(value), Some(Ordering::Less | Ordering::Equal))
                });
                above_min && below_max
            }
            Operation::Len { min, max, .. } => match value {
                FieldValue::Str(s) => {
                    let len = s.chars().count();
                    min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m)
                }
                _ => false,
            },
            Operation::Regex { pattern, .. } => match value {
                FieldValue::Str(s) => pattern.is_match(s),
                _ => false,
            },
            Operation::Is { expected, .. } => *value == FieldValue::Bool(*expected),
            Operation::External { name, checker, .. } => match checker.check(ctx, value) {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(
                        target: "hypatia::validate",
                        field = %self.path,
                        checker = %name,
                        error = %e,
                        "External checker failed; treating the field as invalid"
                    );
                    false
                }
            },
            Operation::Required { .. } | Operation::Break | Operation::StopAll => true,
        }
    }
}
