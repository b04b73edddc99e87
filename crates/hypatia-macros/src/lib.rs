//! Derive macros for Hypatia.
//!
//! The rule engine and the parameter binder never inspect types at runtime.
//! These derives generate the field descriptors they consult instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use hypatia_macros::{ParamTarget, Subject};
//!
//! #[derive(Default, Subject, ParamTarget)]
//! struct SearchRequest {
//!     query: String,
//!     limit: Option<i64>,
//!     #[subject(nested)]
//!     #[param(skip)]
//!     filters: Vec<Filter>,
//! }
//! ```
//!
//! # Field attributes
//!
//! - `#[subject(nested)]` - the field's type implements `Subject` itself
//! - `#[subject(skip)]` - the field is not visible to validation rules
//! - `#[subject(rename = "name")]` - the name rules use for the field
//! - `#[param(skip)]` - the field cannot be bound from parameters
//! - `#[param(rename = "name")]` - the name binding uses for the field

mod param;
mod parse;
mod subject;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `hypatia_core::Subject` for a struct with named fields.
///
/// Every field that is not skipped or nested must have a type implementing
/// `hypatia_core::SubjectField` (`bool`, the integer and float types,
/// `String`, and `Option`s of them).
#[proc_macro_derive(Subject, attributes(subject))]
pub fn derive_subject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    subject::expand_subject(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `hypatia_core::ParamTarget` for a struct with named fields.
///
/// Every field that is not skipped must have a type implementing
/// `hypatia_core::BindParam`.
#[proc_macro_derive(ParamTarget, attributes(param))]
pub fn derive_param_target(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    param::expand_param_target(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
