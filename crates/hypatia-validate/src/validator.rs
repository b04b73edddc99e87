//! Subject-level validation.

use crate::check::CheckerRegistry;
use crate::error::BuildError;
use crate::field::{FieldValidator, ValidationResult};
use crate::rule::Rule;
use hypatia_core::{FieldPath, ServiceErrors, Subject};
use serde::Deserialize;

/// The rule for one field as it appears in configuration.
///
/// Deserializes from an array whose first element is the field path and
/// whose remaining elements are the rule tokens:
///
/// ```
/// use hypatia_validate::FieldRule;
///
/// let rule: FieldRule = serde_json::from_str(r#"["name", "REQ:NO_NAME", "LEN:1-64"]"#).unwrap();
/// assert_eq!(rule.field(), "name");
/// assert_eq!(rule.tokens(), ["REQ:NO_NAME", "LEN:1-64"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct FieldRule {
    field: String,
    tokens: Vec<String>,
}

impl FieldRule {
    /// Creates a rule.
    #[must_use]
    pub fn new<S: Into<String>>(field: impl Into<String>, tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            field: field.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the field path.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the rule tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl TryFrom<Vec<String>> for FieldRule {
    type Error = String;

    fn try_from(mut value: Vec<String>) -> Result<Self, Self::Error> {
        if value.len() < 2 {
            return Err("a field rule needs a field path and at least one operation".to_string());
        }
        let field = value.remove(0);
        Ok(Self {
            field,
            tokens: value,
        })
    }
}

/// Builds validators with a shared default error code and checker registry.
#[derive(Debug, Clone)]
pub struct ValidatorBuilder {
    default_code: String,
    checkers: CheckerRegistry,
}

impl ValidatorBuilder {
    /// Creates a builder whose operations fall back to `default_code`.
    #[must_use]
    pub fn new(default_code: impl Into<String>) -> Self {
        Self {
            default_code: default_code.into(),
            checkers: CheckerRegistry::new(),
        }
    }

    /// Sets the checkers available to `EXT` operations.
    #[must_use]
    pub fn with_checkers(mut self, checkers: CheckerRegistry) -> Self {
        self.checkers = checkers;
        self
    }

    /// Returns the default error code.
    #[must_use]
    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    /// Builds the validator for one field of `T`.
    pub fn build_field<T: Subject>(
        &self,
        field: &str,
        tokens: &[impl AsRef<str>],
    ) -> Result<FieldValidator<T>, BuildError> {
        let path = FieldPath::parse(field)?;
        let kind = T::field_kind(path.segments()).ok_or_else(|| BuildError::UnknownField {
            field: field.to_string(),
        })?;
        let rule = Rule::parse(field, kind, tokens, &self.default_code, &self.checkers)?;

        tracing::debug!(
            target: "hypatia::validate",
            field,
            %kind,
            operations = rule.operations().len(),
            "Built field validator"
        );

        Ok(FieldValidator::new(path, kind, rule))
    }

    /// Builds a validator for every rule, in declaration order.
    pub fn build<T: Subject>(&self, rules: &[FieldRule]) -> Result<RuleValidator<T>, BuildError> {
        let fields = rules
            .iter()
            .map(|r| self.build_field(&r.field, &r.tokens))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleValidator { fields })
    }
}

/// Validates every declared field of a subject.
///
/// Fields are evaluated independently in declaration order; a `STOPALL`
/// that fires halts evaluation of the fields declared after it.
#[derive(Debug)]
pub struct RuleValidator<T> {
    fields: Vec<FieldValidator<T>>,
}

impl<T> Clone for RuleValidator<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<T: Subject> RuleValidator<T> {
    /// Builds a validator from configured rules.
    ///
    /// Equivalent to `ValidatorBuilder::new(default_code).with_checkers(..).build(rules)`.
    pub fn build(
        rules: &[FieldRule],
        default_code: &str,
        checkers: &CheckerRegistry,
    ) -> Result<Self, BuildError> {
        ValidatorBuilder::new(default_code)
            .with_checkers(checkers.clone())
            .build(rules)
    }

    /// Returns the field validators.
    #[must_use]
    pub fn fields(&self) -> &[FieldValidator<T>] {
        &self.fields
    }

    /// Validates `subject`, returning the results of the failing fields.
    #[must_use]
    pub fn validate(&self, subject: &T) -> Vec<ValidationResult> {
        let mut failures = Vec::new();
        for field in &self.fields {
            let result = field.validate(subject);
            let stop = result.stops_all();
            if !result.passed() {
                failures.push(result);
            }
            if stop {
                break;
            }
        }
        failures
    }

    /// Validates `subject`, recording each failure as a predefined error
    /// attributed to its field.
    ///
    /// Returns `true` if any field failed.
    pub fn validate_into(&self, subject: &T, errors: &mut ServiceErrors) -> bool {
        let failures = self.validate(subject);
        for result in &failures {
            for code in result.codes() {
                errors.add_predefined_error_for_field(code, result.field());
            }
        }

        if !failures.is_empty() {
            tracing::debug!(
                target: "hypatia::validate",
                failed_fields = failures.len(),
                "Validation failed"
            );
        }

        !failures.is_empty()
    }
}
