//! Errors raised while building validators.
//!
//! Every problem with a rule is detected when the validator is built, so a
//! misconfigured service fails at startup rather than on a request.

use crate::rule::Opcode;
use hypatia_core::{CoreError, FieldKind};
use thiserror::Error;

/// A rule that cannot be turned into a validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The field path could not be parsed.
    #[error(transparent)]
    InvalidPath(#[from] CoreError),

    /// The subject has no validatable field at the path.
    #[error("{field}: no validatable field at this path")]
    UnknownField {
        /// Field path.
        field: String,
    },

    /// A token is syntactically wrong.
    #[error("{field}: malformed rule token '{token}': {reason}")]
    MalformedRule {
        /// Field path.
        field: String,
        /// The offending token.
        token: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A token starts with an unrecognised opcode.
    #[error("{field}: unknown opcode '{opcode}'")]
    UnknownOpcode {
        /// Field path.
        field: String,
        /// The unrecognised opcode.
        opcode: String,
    },

    /// The opcode cannot be applied to the field's kind.
    #[error("{field}: {opcode} cannot be applied to a {kind} field")]
    UnsupportedOperation {
        /// Field path.
        field: String,
        /// The field's kind.
        kind: FieldKind,
        /// The opcode.
        opcode: Opcode,
    },

    /// A literal does not parse as the field's kind.
    #[error("{field}: '{literal}' in '{token}' is not a valid {kind} literal")]
    InvalidLiteral {
        /// Field path.
        field: String,
        /// The offending token.
        token: String,
        /// The literal that failed to parse.
        literal: String,
        /// The field's kind.
        kind: FieldKind,
    },

    /// Range bounds are missing or inverted.
    #[error("{field}: invalid bounds in '{token}'")]
    InvalidRange {
        /// Field path.
        field: String,
        /// The offending token.
        token: String,
    },

    /// A regular expression failed to compile.
    #[error("{field}: invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Field path.
        field: String,
        /// The pattern as written.
        pattern: String,
        /// The compiler's message.
        reason: String,
    },

    /// No checker is registered under the name.
    #[error("{field}: no external checker named '{name}'")]
    UnknownChecker {
        /// Field path.
        field: String,
        /// Checker name.
        name: String,
    },

    /// The checker does not accept values of the field's kind.
    #[error("{field}: external checker '{name}' does not support {kind} fields")]
    IncompatibleChecker {
        /// Field path.
        field: String,
        /// Checker name.
        name: String,
        /// The field's kind.
        kind: FieldKind,
    },

    /// `REQ` appears more than once.
    #[error("{field}: REQ may only appear once")]
    DuplicateRequired {
        /// Field path.
        field: String,
    },

    /// `REQ` is not the first operation.
    #[error("{field}: REQ must be the first operation")]
    RequiredNotFirst {
        /// Field path.
        field: String,
    },
}
