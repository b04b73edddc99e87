//! # Hypatia Validate
//!
//! Declarative, per-field validation rules.
//!
//! A rule is an ordered list of short tokens of the form
//! `OPCODE:param:param...`, parsed once into a [`FieldValidator`] and reused
//! for every request.
//!
//! | Token | Applies to | Fails when |
//! |---|---|---|
//! | `REQ[:code]` | all but `bool` | the value is absent (nilable `None`, zero or empty) |
//! | `IN:v1,v2[:code]` | numbers, strings | the value is not one of the literals |
//! | `RANGE:min-max[:code]` | numbers | the value is outside the inclusive bounds |
//! | `LEN:min-max[:code]` | strings | the character count is outside the bounds |
//! | `REG:pattern[:code]` | strings | the value does not match the pattern |
//! | `IS:true\|false[:code]` | booleans | the value differs from the literal |
//! | `EXT:checker[:code]` | per checker | the named [`ExternalCheck`] rejects the value |
//! | `BREAK` | all | never; stops the field if an earlier operation failed |
//! | `STOPALL` | all | never; like `BREAK`, and stops all later fields too |
//!
//! Zero and empty values only count as missing for `REQ`. Without `REQ` they
//! are checked like any other value, and only a nilable field holding `None`
//! skips its operations.
//!
//! # Example
//!
//! ```
//! use hypatia_core::{FieldKind, FieldValue, Segment, Subject};
//! use hypatia_validate::ValidatorBuilder;
//!
//! struct Volume(f64);
//!
//! impl Subject for Volume {
//!     fn field_kind(path: &[Segment]) -> Option<FieldKind> {
//!         matches!(path, [Segment::Field(f)] if f == "level").then_some(FieldKind::Float64)
//!     }
//!
//!     fn field_value(&self, _path: &[Segment]) -> FieldValue<'_> {
//!         FieldValue::Float(self.0)
//!     }
//! }
//!
//! let builder = ValidatorBuilder::new("INVALID");
//! let validator = builder
//!     .build_field::<Volume>("level", &["REQ:NO_LEVEL", "RANGE:0-11:TOO_LOUD"])
//!     .unwrap();
//!
//! assert!(validator.validate(&Volume(5.0)).passed());
//! assert_eq!(validator.validate(&Volume(12.0)).codes(), ["TOO_LOUD"]);
//! assert_eq!(validator.validate(&Volume(0.0)).codes(), ["NO_LEVEL"]);
//! ```

#![doc(html_root_url = "https://docs.rs/hypatia-validate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod check;
mod error;
mod field;
mod rule;
mod validator;

pub use check::{CheckContext, CheckError, CheckerRegistry, ExternalCheck, FnChecker};
pub use error::BuildError;
pub use field::{FieldValidator, ValidationContext, ValidationResult};
pub use rule::{Literal, Opcode, Operation, Rule};
pub use validator::{FieldRule, RuleValidator, ValidatorBuilder};
