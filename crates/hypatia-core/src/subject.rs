//! Field descriptors for validation subjects.
//!
//! The rule engine never inspects types at runtime. Instead a [`Subject`]
//! reports, for a [`FieldPath`], the declared [`FieldKind`] of the field
//! (consulted once, when a validator is built) and its current
//! [`FieldValue`] (consulted on every validation call).
//!
//! `Subject` is normally derived with `#[derive(Subject)]` from
//! `hypatia-macros`. Scalar fields are described through [`SubjectField`];
//! fields annotated `#[subject(nested)]` delegate to their own `Subject`
//! implementation, which is provided here for `Vec<T>`, `Option<T>` and
//! `Box<T>`.

use crate::error::CoreError;
use std::fmt;

/// The closed set of field kinds a validation rule can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `bool`
    Bool,
    /// `Option<bool>`
    NilableBool,
    /// 32-bit or narrower signed integers.
    Int32,
    /// 64-bit signed integers.
    Int64,
    /// `Option` of a signed integer.
    NilableInt64,
    /// Unsigned integers.
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `Option<f32>` or `Option<f64>`
    NilableFloat64,
    /// `String`
    String,
    /// `Option<String>`
    NilableString,
}

impl FieldKind {
    /// Returns a short name for the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::NilableBool => "nilable bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::NilableInt64 => "nilable int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::NilableFloat64 => "nilable float64",
            Self::String => "string",
            Self::NilableString => "nilable string",
        }
    }

    /// Returns `true` for kinds that carry an explicit absent marker.
    #[must_use]
    pub const fn is_nilable(&self) -> bool {
        matches!(
            self,
            Self::NilableBool | Self::NilableInt64 | Self::NilableFloat64 | Self::NilableString
        )
    }

    /// Returns `true` for integer and floating point kinds.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Returns `true` for integer kinds.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::NilableInt64 | Self::UInt64
        )
    }

    /// Returns `true` for floating point kinds.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64 | Self::NilableFloat64)
    }

    /// Returns `true` for string kinds.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String | Self::NilableString)
    }

    /// Returns `true` for boolean kinds.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool | Self::NilableBool)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The current value of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// A nilable field with no value, or a path that does not resolve.
    Absent,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number, widened to `f64`.
    Float(f64),
    /// A string.
    Str(&'a str),
}

impl FieldValue<'_> {
    /// Returns `true` if the value is absent or is the zero value of its type.
    ///
    /// `false` is not treated as a zero value.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_absent_or_zero(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Bool(_) => false,
            Self::Int(i) => *i == 0,
            Self::UInt(u) => *u == 0,
            Self::Float(f) => *f == 0.0,
            Self::Str(s) => s.is_empty(),
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named field.
    Field(String),
    /// An element of a list.
    Index(usize),
}

/// A dotted and indexed locator for a field, e.g. `artist.albums[2].title`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a path.
    pub fn parse(path: &str) -> Result<Self, CoreError> {
        let invalid = |reason| CoreError::InvalidFieldPath {
            path: path.to_string(),
            reason,
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(invalid("empty field name"));
            }
            segments.push(Segment::Field(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed index"))?;
                let index = rest[1..close]
                    .parse()
                    .map_err(|_| invalid("index is not a number"))?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected text after index"));
                }
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A value whose fields can be located by path and validated.
pub trait Subject {
    /// Returns the declared kind of the field at `path`, or `None` if there is
    /// no validatable field there.
    fn field_kind(path: &[Segment]) -> Option<FieldKind>
    where
        Self: Sized;

    /// Returns the current value of the field at `path`.
    fn field_value(&self, path: &[Segment]) -> FieldValue<'_>;
}

/// A scalar field type with a fixed [`FieldKind`].
pub trait SubjectField {
    /// The kind reported for fields of this type.
    const KIND: FieldKind;

    /// Returns the current value.
    fn subject_value(&self) -> FieldValue<'_>;
}

macro_rules! subject_field {
    (nilable $kind:ident, $variant:ident as $conv:ty: $($ty:ty),+) => {$(
        impl SubjectField for Option<$ty> {
            const KIND: FieldKind = FieldKind::$kind;

            #[allow(clippy::cast_lossless, clippy::cast_possible_wrap, clippy::unnecessary_cast)]
            fn subject_value(&self) -> FieldValue<'_> {
                self.map_or(FieldValue::Absent, |v| FieldValue::$variant(v as $conv))
            }
        }
    )+};
    ($kind:ident, $variant:ident as $conv:ty: $($ty:ty),+) => {$(
        impl SubjectField for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            #[allow(clippy::cast_lossless, clippy::cast_possible_wrap, clippy::unnecessary_cast)]
            fn subject_value(&self) -> FieldValue<'_> {
                FieldValue::$variant(*self as $conv)
            }
        }
    )+};
}

subject_field!(Int32, Int as i64: i8, i16, i32);
subject_field!(Int64, Int as i64: i64, isize);
subject_field!(UInt64, UInt as u64: u8, u16, u32, u64, usize);
subject_field!(Float32, Float as f64: f32);
subject_field!(Float64, Float as f64: f64);
subject_field!(nilable NilableInt64, Int as i64: i8, i16, i32, i64, isize);
subject_field!(nilable NilableFloat64, Float as f64: f32, f64);

impl SubjectField for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn subject_value(&self) -> FieldValue<'_> {
        FieldValue::Bool(*self)
    }
}

impl SubjectField for Option<bool> {
    const KIND: FieldKind = FieldKind::NilableBool;

    fn subject_value(&self) -> FieldValue<'_> {
        self.map_or(FieldValue::Absent, FieldValue::Bool)
    }
}

impl SubjectField for String {
    const KIND: FieldKind = FieldKind::String;

    fn subject_value(&self) -> FieldValue<'_> {
        FieldValue::Str(self)
    }
}

impl SubjectField for Option<String> {
    const KIND: FieldKind = FieldKind::NilableString;

    fn subject_value(&self) -> FieldValue<'_> {
        self.as_deref().map_or(FieldValue::Absent, FieldValue::Str)
    }
}

impl<T: Subject> Subject for Vec<T> {
    fn field_kind(path: &[Segment]) -> Option<FieldKind> {
        match path.split_first() {
            Some((Segment::Index(_), rest)) => T::field_kind(rest),
            _ => None,
        }
    }

    fn field_value(&self, path: &[Segment]) -> FieldValue<'_> {
        match path.split_first() {
            Some((Segment::Index(i), rest)) => self
                .get(*i)
                .map_or(FieldValue::Absent, |item| item.field_value(rest)),
            _ => FieldValue::Absent,
        }
    }
}

impl<T: Subject> Subject for Option<T> {
    fn field_kind(path: &[Segment]) -> Option<FieldKind> {
        T::field_kind(path)
    }

    fn field_value(&self, path: &[Segment]) -> FieldValue<'_> {
        self.as_ref()
            .map_or(FieldValue::Absent, |inner| inner.field_value(path))
    }
}

impl<T: Subject> Subject for Box<T> {
    fn field_kind(path: &[Segment]) -> Option<FieldKind> {
        T::field_kind(path)
    }

    fn field_value(&self, path: &[Segment]) -> FieldValue<'_> {
        (**self).field_value(path)
    }
}
