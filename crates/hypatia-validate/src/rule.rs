//! Rule tokens and their parsed form.
//!
//! A [`Rule`] is parsed once from its tokens against the declared
//! [`FieldKind`] of its field. Literals are parsed with the numeric semantics
//! of that kind, so a malformed literal or an operation the kind does not
//! support is rejected here rather than during validation.

use crate::check::{CheckerRegistry, ExternalCheck};
use crate::error::BuildError;
use hypatia_core::{FieldKind, FieldValue};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default code for a failed `IN` operation with no other code available.
pub(crate) const NOT_IN: &str = "NOT_IN";

/// The operations a rule token can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `REQ`
    Required,
    /// `IN`
    In,
    /// `RANGE`
    Range,
    /// `LEN`
    Len,
    /// `REG`
    Regex,
    /// `IS`
    Is,
    /// `BREAK`
    Break,
    /// `STOPALL`
    StopAll,
    /// `EXT`
    External,
}

impl Opcode {
    /// Returns the opcode as written in rule tokens.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "REQ",
            Self::In => "IN",
            Self::Range => "RANGE",
            Self::Len => "LEN",
            Self::Regex => "REG",
            Self::Is => "IS",
            Self::Break => "BREAK",
            Self::StopAll => "STOPALL",
            Self::External => "EXT",
        }
    }

    /// Returns `true` if the opcode may be applied to fields of `kind`.
    ///
    /// `EXT` is further restricted by the checker's own supported kinds.
    #[must_use]
    pub const fn supports(&self, kind: FieldKind) -> bool {
        match self {
            Self::Required => !matches!(kind, FieldKind::Bool),
            Self::In => !kind.is_bool(),
            Self::Range => kind.is_numeric(),
            Self::Len | Self::Regex => kind.is_string(),
            Self::Is => kind.is_bool(),
            Self::Break | Self::StopAll | Self::External => true,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQ" => Ok(Self::Required),
            "IN" => Ok(Self::In),
            "RANGE" => Ok(Self::Range),
            "LEN" => Ok(Self::Len),
            "REG" => Ok(Self::Regex),
            "IS" => Ok(Self::Is),
            "BREAK" => Ok(Self::Break),
            "STOPALL" => Ok(Self::StopAll),
            "EXT" => Ok(Self::External),
            _ => Err(()),
        }
    }
}

/// A literal parsed with the semantics of a field's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Signed integer literal.
    Int(i64),
    /// Unsigned integer literal.
    UInt(u64),
    /// Floating point literal, widened to `f64`.
    Float(f64),
    /// String literal.
    Str(String),
}

impl Literal {
    /// Parses `raw` as a literal of `kind`.
    ///
    /// `Float32` literals are parsed at `f32` precision so they compare equal
    /// to `f32` field values widened the same way.
    #[must_use]
    pub fn parse(kind: FieldKind, raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match kind {
            FieldKind::Int32 => trimmed.parse::<i32>().ok().map(|v| Self::Int(v.into())),
            FieldKind::Int64 | FieldKind::NilableInt64 => trimmed.parse().ok().map(Self::Int),
            FieldKind::UInt64 => trimmed.parse().ok().map(Self::UInt),
            FieldKind::Float32 => trimmed.parse::<f32>().ok().map(|v| Self::Float(v.into())),
            FieldKind::Float64 | FieldKind::NilableFloat64 => {
                trimmed.parse().ok().map(Self::Float)
            }
            FieldKind::String | FieldKind::NilableString => Some(Self::Str(raw.to_string())),
            FieldKind::Bool | FieldKind::NilableBool => None,
        }
    }

    /// Compares a field value with this literal.
    ///
    /// Returns `None` when the two cannot be ordered (mismatched types or NaN).
    #[must_use]
    pub fn compare(&self, value: &FieldValue<'_>) -> Option<Ordering> {
        match (value, self) {
            (FieldValue::Int(v), Self::Int(l)) => Some(v.cmp(l)),
            (FieldValue::UInt(v), Self::UInt(l)) => Some(v.cmp(l)),
            (FieldValue::Float(v), Self::Float(l)) => v.partial_cmp(l),
            (FieldValue::Str(v), Self::Str(l)) => Some((*v).cmp(l.as_str())),
            _ => None,
        }
    }
}

/// One parsed operation of a rule.
#[derive(Clone)]
pub enum Operation {
    /// Fails if the value is absent.
    Required {
        /// Code reported on failure.
        code: String,
    },
    /// Fails if the value is not one of the literals.
    In {
        /// Accepted values.
        set: Vec<Literal>,
        /// Code reported on failure.
        code: String,
    },
    /// Fails if the value is outside the inclusive bounds.
    Range {
        /// Lower bound, if any.
        min: Option<Literal>,
        /// Upper bound, if any.
        max: Option<Literal>,
        /// Code reported on failure.
        code: String,
    },
    /// Fails if the string's character count is outside the inclusive bounds.
    Len {
        /// Minimum length, if any.
        min: Option<usize>,
        /// Maximum length, if any.
        max: Option<usize>,
        /// Code reported on failure.
        code: String,
    },
    /// Fails if the string does not match the pattern.
    Regex {
        /// Compiled pattern.
        pattern: Regex,
        /// Code reported on failure.
        code: String,
    },
    /// Fails if the boolean differs from the expected value.
    Is {
        /// Expected value.
        expected: bool,
        /// Code reported on failure.
        code: String,
    },
    /// Stops the field if an earlier operation failed.
    Break,
    /// Stops the field and every later field if an earlier operation failed.
    StopAll,
    /// Delegates to an external checker.
    External {
        /// Name the checker was registered under.
        name: String,
        /// The resolved checker.
        checker: Arc<dyn ExternalCheck>,
        /// Code reported on failure.
        code: String,
    },
}

impl Operation {
    /// Returns the opcode of this operation.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Required { .. } => Opcode::Required,
            Self::In { .. } => Opcode::In,
            Self::Range { .. } => Opcode::Range,
            Self::Len { .. } => Opcode::Len,
            Self::Regex { .. } => Opcode::Regex,
            Self::Is { .. } => Opcode::Is,
            Self::Break => Opcode::Break,
            Self::StopAll => Opcode::StopAll,
            Self::External { .. } => Opcode::External,
        }
    }

    /// Returns the code reported when this operation fails.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Required { code }
            | Self::In { code, .. }
            | Self::Range { code, .. }
            | Self::Len { code, .. }
            | Self::Regex { code, .. }
            | Self::Is { code, .. }
            | Self::External { code, .. } => Some(code),
            Self::Break | Self::StopAll => None,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External { name, code, .. } => f
                .debug_struct("External")
                .field("name", name)
                .field("code", code)
                .finish(),
            Self::Regex { pattern, code } => f
                .debug_struct("Regex")
                .field("pattern", &pattern.as_str())
                .field("code", code)
                .finish(),
            Self::Required { code } => f.debug_struct("Required").field("code", code).finish(),
            Self::In { set, code } => f
                .debug_struct("In")
                .field("set", set)
                .field("code", code)
                .finish(),
            Self::Range { min, max, code } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .field("code", code)
                .finish(),
            Self::Len { min, max, code } => f
                .debug_struct("Len")
                .field("min", min)
                .field("max", max)
                .field("code", code)
                .finish(),
            Self::Is { expected, code } => f
                .debug_struct("Is")
                .field("expected", expected)
                .field("code", code)
                .finish(),
            Self::Break => f.write_str("Break"),
            Self::StopAll => f.write_str("StopAll"),
        }
    }
}

/// The parsed, immutable operation list for one field.
#[derive(Debug, Clone)]
pub struct Rule {
    operations: Vec<Operation>,
    required_code: Option<String>,
}

impl Rule {
    /// Returns the operations in declaration order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the code of the `REQ` operation, if the rule has one.
    #[must_use]
    pub fn required_code(&self) -> Option<&str> {
        self.required_code.as_deref()
    }

    /// Parses `tokens` for a field of `kind`.
    pub(crate) fn parse<S: AsRef<str>>(
        field: &str,
        kind: FieldKind,
        tokens: &[S],
        default_code: &str,
        checkers: &CheckerRegistry,
    ) -> Result<Self, BuildError> {
        let malformed = |token: &str, reason| BuildError::MalformedRule {
            field: field.to_string(),
            token: token.to_string(),
            reason,
        };

        if tokens.is_empty() {
            return Err(malformed("", "a rule needs at least one operation"));
        }

        let required_code = match tokens[0].as_ref().split(':').collect::<Vec<_>>().as_slice() {
            ["REQ"] => Some(default_code.to_string()),
            ["REQ", code] => Some(non_empty_code(code).ok_or_else(|| {
                malformed(tokens[0].as_ref(), "empty error code")
            })?),
            _ => None,
        };
        let fallback = required_code.as_deref().unwrap_or(default_code);

        let parser = TokenParser {
            field,
            kind,
            fallback,
            required_code: required_code.as_deref(),
            checkers,
        };

        let mut operations = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            let op = parser.parse(token.as_ref())?;
            if let Operation::Required { .. } = op {
                if i > 0 {
                    return Err(if required_code.is_some() {
                        BuildError::DuplicateRequired {
                            field: field.to_string(),
                        }
                    } else {
                        BuildError::RequiredNotFirst {
                            field: field.to_string(),
                        }
                    });
                }
            }
            operations.push(op);
        }

        Ok(Self {
            operations,
            required_code,
        })
    }
}

fn non_empty_code(code: &str) -> Option<String> {
    (!code.is_empty()).then(|| code.to_string())
}

struct TokenParser<'a> {
    field: &'a str,
    kind: FieldKind,
    fallback: &'a str,
    required_code: Option<&'a str>,
    checkers: &'a CheckerRegistry,
}

impl TokenParser<'_> {
    fn parse(&self, token: &str) -> Result<Operation, BuildError> {
        let parts: Vec<&str> = token.split(':').collect();
        let opcode: Opcode = parts[0].parse().map_err(|()| BuildError::UnknownOpcode {
            field: self.field.to_string(),
            opcode: parts[0].to_string(),
        })?;

        if !opcode.supports(self.kind) {
            return Err(BuildError::UnsupportedOperation {
                field: self.field.to_string(),
                kind: self.kind,
                opcode,
            });
        }

        match opcode {
            Opcode::Required => {
                self.expect_params(token, &parts, 0, 1)?;
                Ok(Operation::Required {
                    code: self.code(token, parts.get(1), self.fallback)?,
                })
            }
            Opcode::Break | Opcode::StopAll => {
                self.expect_params(token, &parts, 0, 0)?;
                Ok(if opcode == Opcode::Break {
                    Operation::Break
                } else {
                    Operation::StopAll
                })
            }
            Opcode::In => {
                self.expect_params(token, &parts, 1, 2)?;
                let set = parts[1]
                    .split(',')
                    .map(|raw| {
                        Literal::parse(self.kind, raw).ok_or_else(|| self.invalid_literal(token, raw))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let fallback = self.required_code.unwrap_or(NOT_IN);
                Ok(Operation::In {
                    set,
                    code: self.code(token, parts.get(2), fallback)?,
                })
            }
            Opcode::Range => {
                self.expect_params(token, &parts, 1, 2)?;
                let (min, max) = self.bounds(token, parts[1], |raw| {
                    Literal::parse(self.kind, raw)
                })?;
                if let (Some(lo), Some(hi)) = (&min, &max) {
                    if literal_order(lo, hi) == Some(Ordering::Greater) {
                        return Err(self.invalid_range(token));
                    }
                }
                Ok(Operation::Range {
                    min,
                    max,
                    code: self.code(token, parts.get(2), self.fallback)?,
                })
            }
            Opcode::Len => {
                self.expect_params(token, &parts, 1, 2)?;
                let (min, max) = self.bounds::<usize>(token, parts[1], |raw| raw.trim().parse().ok())?;
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(self.invalid_range(token));
                    }
                }
                Ok(Operation::Len {
                    min,
                    max,
                    code: self.code(token, parts.get(2), self.fallback)?,
                })
            }
            Opcode::Regex => {
                if parts.len() < 2 {
                    return Err(self.malformed(token, "REG needs a pattern"));
                }
                let (pattern, code) = if parts.len() == 2 {
                    (parts[1].to_string(), None)
                } else {
                    (parts[1..parts.len() - 1].join(":"), parts.last())
                };
                let compiled = Regex::new(&pattern).map_err(|e| BuildError::InvalidPattern {
                    field: self.field.to_string(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Operation::Regex {
                    pattern: compiled,
                    code: self.code(token, code, self.fallback)?,
                })
            }
            Opcode::Is => {
                self.expect_params(token, &parts, 1, 2)?;
                let expected = match parts[1] {
                    "true" => true,
                    "false" => false,
                    other => return Err(self.invalid_literal(token, other)),
                };
                Ok(Operation::Is {
                    expected,
                    code: self.code(token, parts.get(2), self.fallback)?,
                })
            }
            Opcode::External => {
                self.expect_params(token, &parts, 1, 2)?;
                let name = parts[1];
                let checker = self.checkers.get(name).ok_or_else(|| BuildError::UnknownChecker {
                    field: self.field.to_string(),
                    name: name.to_string(),
                })?;
                if !checker.supports(self.kind) {
                    return Err(BuildError::IncompatibleChecker {
                        field: self.field.to_string(),
                        name: name.to_string(),
                        kind: self.kind,
                    });
                }
                Ok(Operation::External {
                    name: name.to_string(),
                    checker,
                    code: self.code(token, parts.get(2), self.fallback)?,
                })
            }
        }
    }

    /// Checks that the token has between `min` and `max` parameters after the opcode.
    fn expect_params(
        &self,
        token: &str,
        parts: &[&str],
        min: usize,
        max: usize,
    ) -> Result<(), BuildError> {
        let count = parts.len() - 1;
        if count < min {
            Err(self.malformed(token, "missing parameter"))
        } else if count > max {
            Err(self.malformed(token, "too many parameters"))
        } else {
            Ok(())
        }
    }

    fn code(&self, token: &str, explicit: Option<&&str>, fallback: &str) -> Result<String, BuildError> {
        match explicit {
            Some(code) => non_empty_code(code).ok_or_else(|| self.malformed(token, "empty error code")),
            None => Ok(fallback.to_string()),
        }
    }

    /// Parses `min-max`, `min-` or `-max` bounds.
    fn bounds<T>(
        &self,
        token: &str,
        spec: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<(Option<T>, Option<T>), BuildError> {
        let (lo, hi) = split_bounds(spec).ok_or_else(|| self.invalid_range(token))?;
        let parse_bound = |raw: &str| -> Result<Option<T>, BuildError> {
            if raw.is_empty() {
                Ok(None)
            } else {
                parse(raw)
                    .map(Some)
                    .ok_or_else(|| self.invalid_literal(token, raw))
            }
        };
        Ok((parse_bound(lo)?, parse_bound(hi)?))
    }

    fn malformed(&self, token: &str, reason: &'static str) -> BuildError {
        BuildError::MalformedRule {
            field: self.field.to_string(),
            token: token.to_string(),
            reason,
        }
    }

    fn invalid_literal(&self, token: &str, literal: &str) -> BuildError {
        BuildError::InvalidLiteral {
            field: self.field.to_string(),
            token: token.to_string(),
            literal: literal.to_string(),
            kind: self.kind,
        }
    }

    fn invalid_range(&self, token: &str) -> BuildError {
        BuildError::InvalidRange {
            field: self.field.to_string(),
            token: token.to_string(),
        }
    }
}

/// Splits a bounds expression into its lower and upper parts.
///
/// The separator is the first `-` that is neither the leading character nor
/// part of an exponent (`1E-5`) nor the sign of the upper bound (`-10--5`).
/// An expression starting with `-` and containing no separator is an upper
/// bound only. Returns `None` if both parts are empty.
fn split_bounds(spec: &str) -> Option<(&str, &str)> {
    let bytes = spec.as_bytes();
    let separator = (1..bytes.len()).find(|&i| {
        bytes[i] == b'-' && !matches!(bytes[i - 1], b'e' | b'E' | b'-')
    });

    let (lo, hi) = match separator {
        Some(i) => (&spec[..i], &spec[i + 1..]),
        None => match spec.strip_prefix('-') {
            Some(upper) => ("", upper),
            None => return None,
        },
    };

    if lo.is_empty() && hi.is_empty() {
        None
    } else {
        Some((lo, hi))
    }
}

fn literal_order(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Int(x), Literal::Int(y)) => Some(x.cmp(y)),
        (Literal::UInt(x), Literal::UInt(y)) => Some(x.cmp(y)),
        (Literal::Float(x), Literal::Float(y)) => x.partial_cmp(y),
        (Literal::Str(x), Literal::Str(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kind: FieldKind, tokens: &[&str]) -> Result<Rule, BuildError> {
        Rule::parse("f", kind, tokens, "DEF", &CheckerRegistry::new())
    }

    #[test]
    fn test_split_bounds() {
        assert_eq!(split_bounds("1-5"), Some(("1", "5")));
        assert_eq!(split_bounds("5-"), Some(("5", "")));
        assert_eq!(split_bounds("-5"), Some(("", "5")));
        assert_eq!(split_bounds("-10--5"), Some(("-10", "-5")));
        assert_eq!(split_bounds("--5"), Some(("", "-5")));
        assert_eq!(split_bounds("-10-"), Some(("-10", "")));
        assert_eq!(split_bounds("1E-2-2E3"), Some(("1E-2", "2E3")));
        assert_eq!(split_bounds("-"), None);
        assert_eq!(split_bounds("5"), None);
        assert_eq!(split_bounds(""), None);
    }

    #[test]
    fn test_literal_parse_follows_kind() {
        assert_eq!(Literal::parse(FieldKind::Int32, "7"), Some(Literal::Int(7)));
        assert_eq!(Literal::parse(FieldKind::Int32, "3000000000"), None);
        assert_eq!(
            Literal::parse(FieldKind::Int64, "3000000000"),
            Some(Literal::Int(3_000_000_000))
        );
        assert_eq!(Literal::parse(FieldKind::UInt64, "-1"), None);
        assert_eq!(
            Literal::parse(FieldKind::Float64, "2E10"),
            Some(Literal::Float(2e10))
        );
        assert_eq!(
            Literal::parse(FieldKind::Float32, "3.1"),
            Some(Literal::Float(f64::from(3.1_f32)))
        );
        assert_eq!(Literal::parse(FieldKind::Float64, "X"), None);
        assert_eq!(
            Literal::parse(FieldKind::String, " a "),
            Some(Literal::Str(" a ".to_string()))
        );
    }

    #[test]
    fn test_code_defaults() {
        let rule = parse(FieldKind::Int64, &["REQ:MISSING", "IN:1,2", "RANGE:1-5"]).unwrap();
        let codes: Vec<_> = rule.operations().iter().filter_map(Operation::code).collect();
        assert_eq!(codes, vec!["MISSING", "MISSING", "MISSING"]);

        let rule = parse(FieldKind::Int64, &["IN:1,2", "RANGE:1-5", "IN:3:OTHER"]).unwrap();
        let codes: Vec<_> = rule.operations().iter().filter_map(Operation::code).collect();
        assert_eq!(codes, vec!["NOT_IN", "DEF", "OTHER"]);
        assert!(rule.required_code().is_none());

        let rule = parse(FieldKind::String, &["REQ"]).unwrap();
        assert_eq!(rule.required_code(), Some("DEF"));
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            parse(FieldKind::Int64, &["NOPE:1"]),
            Err(BuildError::UnknownOpcode { opcode, .. }) if opcode == "NOPE"
        ));
    }

    #[test]
    fn test_unsupported_operations() {
        for (kind, token) in [
            (FieldKind::String, "RANGE:1-5"),
            (FieldKind::Int64, "LEN:1-5"),
            (FieldKind::Float64, "REG:^a$"),
            (FieldKind::String, "IS:true"),
            (FieldKind::Bool, "REQ:MISSING"),
            (FieldKind::NilableBool, "IN:true"),
        ] {
            assert!(
                matches!(
                    parse(kind, &[token]),
                    Err(BuildError::UnsupportedOperation { .. })
                ),
                "{token} on {kind} should be rejected"
            );
        }
    }

    #[test]
    fn test_required_position() {
        assert!(matches!(
            parse(FieldKind::String, &["LEN:1-", "REQ:X"]),
            Err(BuildError::RequiredNotFirst { .. })
        ));
        assert!(matches!(
            parse(FieldKind::String, &["REQ:X", "REQ:Y"]),
            Err(BuildError::DuplicateRequired { .. })
        ));
        assert!(parse(FieldKind::NilableBool, &["REQ:X", "IS:true"]).is_ok());
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["IN", "RANGE", "BREAK:X", "IN:1:A:B", "REQ:", "IN:1:", "EXT"] {
            assert!(
                matches!(
                    parse(FieldKind::Int64, &[token]),
                    Err(BuildError::MalformedRule { .. })
                ),
                "{token} should be malformed"
            );
        }
        assert!(parse(FieldKind::Int64, &[] as &[&str]).is_err());
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            parse(FieldKind::Int64, &["RANGE:5-1"]),
            Err(BuildError::InvalidRange { .. })
        ));
        assert!(matches!(
            parse(FieldKind::Int64, &["RANGE:-"]),
            Err(BuildError::InvalidRange { .. })
        ));
        assert!(matches!(
            parse(FieldKind::Int64, &["RANGE:a-5"]),
            Err(BuildError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            parse(FieldKind::String, &["LEN:9-2"]),
            Err(BuildError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_regex_with_colon_needs_code() {
        let rule = parse(FieldKind::String, &["REG:^\\d{2}:\\d{2}$:BAD_TIME"]).unwrap();
        match &rule.operations()[0] {
            Operation::Regex { pattern, code } => {
                assert_eq!(pattern.as_str(), "^\\d{2}:\\d{2}$");
                assert_eq!(code, "BAD_TIME");
            }
            other => panic!("unexpected operation {other:?}"),
        }

        assert!(matches!(
            parse(FieldKind::String, &["REG:(unclosed"]),
            Err(BuildError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_unknown_checker_is_build_error() {
        assert!(matches!(
            parse(FieldKind::Int64, &["EXT:nobody:FAIL"]),
            Err(BuildError::UnknownChecker { name, .. }) if name == "nobody"
        ));
    }
}
