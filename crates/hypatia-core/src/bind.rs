//! Binding of request parameters to request body fields.
//!
//! A [`ParamTarget`] (normally derived with `#[derive(ParamTarget)]`) exposes
//! its fields by name. Each bindable field's type implements [`BindParam`],
//! which converts the raw parameter values into the field's type.

use crate::params::{parse_bool, ParamError, WsParams};
use thiserror::Error;

/// A failure to bind a parameter to a field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The target has no bindable field with this name.
    #[error("no bindable field named {0}")]
    NoSuchField(String),

    /// The parameter could not be converted to the field's type.
    #[error("value '{value}' cannot be converted to {expected}")]
    WrongType {
        /// The raw value.
        value: String,
        /// Description of the field's type.
        expected: &'static str,
    },

    /// A parameter supplied more than once targets a single-valued field.
    #[error("multiple values supplied for a single-valued field")]
    NotAList,

    /// No value was supplied.
    #[error("no value supplied")]
    Missing,
}

impl From<ParamError> for BindError {
    fn from(e: ParamError) -> Self {
        match e {
            ParamError::Invalid {
                value, expected, ..
            } => Self::WrongType { value, expected },
            ParamError::Missing(_) | ParamError::Malformed(_) => Self::Missing,
        }
    }
}

/// A request body whose fields can be populated from request parameters.
pub trait ParamTarget {
    /// Binds the parameter `key` from `params` to the field named `field`.
    fn bind_field(&mut self, field: &str, params: &WsParams, key: &str) -> Result<(), BindError>;

    /// Returns the names of every bindable field.
    fn param_fields() -> &'static [&'static str]
    where
        Self: Sized;
}

/// A field type that can be populated from request parameters.
pub trait BindParam {
    /// Replaces the field's value with the value(s) of `key`.
    fn bind_param(&mut self, params: &WsParams, key: &str) -> Result<(), BindError>;
}

/// A scalar type that can be parsed from a single parameter value.
trait ParamScalar: Sized {
    const EXPECTED: &'static str;

    fn parse_param(raw: &str) -> Option<Self>;
}

macro_rules! from_str_scalar {
    ($($ty:ty => $expected:literal),+ $(,)?) => {$(
        impl ParamScalar for $ty {
            const EXPECTED: &'static str = $expected;

            fn parse_param(raw: &str) -> Option<Self> {
                raw.parse().ok()
            }
        }
    )+};
}

from_str_scalar! {
    i8 => "an integer", i16 => "an integer", i32 => "an integer", i64 => "an integer",
    isize => "an integer", u8 => "a positive integer", u16 => "a positive integer",
    u32 => "a positive integer", u64 => "a positive integer", usize => "a positive integer",
    f32 => "a number", f64 => "a number", String => "text",
}

impl ParamScalar for bool {
    const EXPECTED: &'static str = "true or false";

    fn parse_param(raw: &str) -> Option<Self> {
        parse_bool(raw)
    }
}

fn single<T: ParamScalar>(params: &WsParams, key: &str) -> Result<T, BindError> {
    if params.multiple_values(key) {
        return Err(BindError::NotAList);
    }
    let raw = params.string_value(key)?;
    T::parse_param(raw).ok_or_else(|| BindError::WrongType {
        value: raw.to_string(),
        expected: T::EXPECTED,
    })
}

fn all<T: ParamScalar>(params: &WsParams, key: &str) -> Result<Vec<T>, BindError> {
    params
        .string_values(key)?
        .iter()
        .map(|raw| {
            T::parse_param(raw).ok_or_else(|| BindError::WrongType {
                value: raw.clone(),
                expected: T::EXPECTED,
            })
        })
        .collect()
}

macro_rules! bind_param {
    ($($ty:ty),+) => {$(
        impl BindParam for $ty {
            fn bind_param(&mut self, params: &WsParams, key: &str) -> Result<(), BindError> {
                *self = single(params, key)?;
                Ok(())
            }
        }

        impl BindParam for Option<$ty> {
            fn bind_param(&mut self, params: &WsParams, key: &str) -> Result<(), BindError> {
                *self = Some(single(params, key)?);
                Ok(())
            }
        }

        impl BindParam for Vec<$ty> {
            fn bind_param(&mut self, params: &WsParams, key: &str) -> Result<(), BindError> {
                *self = all(params, key)?;
                Ok(())
            }
        }
    )+};
}

bind_param!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String);
