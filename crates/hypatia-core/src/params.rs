//! Request parameters.
//!
//! [`WsParams`] holds either the query parameters of a request or the
//! segments of its path captured by a regular expression, with typed
//! accessors that report conversion failures as [`ParamError`]s.

use indexmap::IndexMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when reading a parameter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// No value exists for the parameter.
    #[error("no value available for key {0}")]
    Missing(String),

    /// The value could not be converted to the requested type.
    #[error("value '{value}' of {name} cannot be converted to {expected}")]
    Invalid {
        /// Parameter name.
        name: String,
        /// The raw value.
        value: String,
        /// Description of the requested type.
        expected: &'static str,
    },

    /// The query string could not be decoded.
    #[error("malformed query string: {0}")]
    Malformed(String),
}

impl ParamError {
    fn invalid(name: &str, value: &str, expected: &'static str) -> Self {
        Self::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

/// Query or path parameters of a request.
///
/// Query parameters may be supplied more than once; scalar accessors return
/// the last value supplied.
///
/// # Example
///
/// ```
/// use hypatia_core::WsParams;
///
/// let params = WsParams::from_query("id=7&tag=a&tag=b").unwrap();
/// assert_eq!(params.int_value("id", 32).unwrap(), 7);
/// assert!(params.multiple_values("tag"));
/// assert_eq!(params.string_value("tag").unwrap(), "b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsParams {
    values: IndexMap<String, Vec<String>>,
    names: Vec<String>,
}

impl WsParams {
    /// Creates parameters from a URL-encoded query string.
    pub fn from_query(query: &str) -> Result<Self, ParamError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).map_err(|e| ParamError::Malformed(e.to_string()))?;
        Ok(Self::from_pairs(pairs))
    }

    /// Creates parameters from decoded name/value pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut values: IndexMap<String, Vec<String>> = IndexMap::new();
        for (name, value) in pairs {
            values.entry(name).or_default().push(value);
        }
        let names = values.keys().cloned().collect();
        Self { values, names }
    }

    /// Creates parameters from path segments captured by regular expression groups.
    ///
    /// Each captured value is stored under its position (`"0"`, `"1"`, ...) and
    /// the target name for that position is recorded in [`param_names`](Self::param_names).
    /// Targets beyond the number of captured values are ignored.
    #[must_use]
    pub fn for_path<S: AsRef<str>>(targets: &[S], captured: &[&str]) -> Self {
        let mut values = IndexMap::new();
        let mut names = Vec::new();
        for (i, target) in targets.iter().enumerate().take(captured.len()) {
            values.insert(i.to_string(), vec![captured[i].to_string()]);
            names.push(target.as_ref().to_string());
        }
        Self { values, names }
    }

    /// Returns the names of the stored parameters.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Returns `true` if the parameter exists, even with an empty value.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns `true` if the parameter exists and its value is not empty.
    #[must_use]
    pub fn not_empty(&self, key: &str) -> bool {
        self.string_value(key).is_ok_and(|s| !s.is_empty())
    }

    /// Returns `true` if the parameter was supplied more than once.
    #[must_use]
    pub fn multiple_values(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| v.len() > 1)
    }

    /// Returns every value supplied for the parameter.
    pub fn string_values(&self, key: &str) -> Result<&[String], ParamError> {
        self.values
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    /// Returns the last value supplied for the parameter.
    pub fn string_value(&self, key: &str) -> Result<&str, ParamError> {
        self.string_values(key)?
            .last()
            .map(String::as_str)
            .ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    /// Returns the parameter as a bool.
    ///
    /// Accepts `1`, `t`, `true` and `0`, `f`, `false` in any case.
    pub fn bool_value(&self, key: &str) -> Result<bool, ParamError> {
        let raw = self.string_value(key)?;
        parse_bool(raw).ok_or_else(|| ParamError::invalid(key, raw, "bool"))
    }

    /// Returns the parameter as a signed integer that fits in `bits` bits.
    pub fn int_value(&self, key: &str, bits: u32) -> Result<i64, ParamError> {
        let raw = self.string_value(key)?;
        let value: i64 = raw
            .parse()
            .map_err(|_| ParamError::invalid(key, raw, "integer"))?;
        if (1..64).contains(&bits) {
            let max = (1_i64 << (bits - 1)) - 1;
            let min = -(1_i64 << (bits - 1));
            if value < min || value > max {
                return Err(ParamError::invalid(key, raw, "integer"));
            }
        }
        Ok(value)
    }

    /// Returns the parameter as an unsigned integer that fits in `bits` bits.
    pub fn uint_value(&self, key: &str, bits: u32) -> Result<u64, ParamError> {
        let raw = self.string_value(key)?;
        let value: u64 = raw
            .parse()
            .map_err(|_| ParamError::invalid(key, raw, "unsigned integer"))?;
        if (1..64).contains(&bits) && value > (1_u64 << bits) - 1 {
            return Err(ParamError::invalid(key, raw, "unsigned integer"));
        }
        Ok(value)
    }

    /// Returns the parameter as a float of `bits` precision, widened to `f64`.
    pub fn float_value(&self, key: &str, bits: u32) -> Result<f64, ParamError> {
        let raw = self.string_value(key)?;
        let parsed = if bits == 32 {
            raw.parse::<f32>().map(f64::from)
        } else {
            raw.parse::<f64>()
        };
        parsed.map_err(|_| ParamError::invalid(key, raw, "number"))
    }

    /// Parses the last value supplied for the parameter.
    pub fn parse<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ParamError> {
        let raw = self.string_value(key)?;
        raw.parse().map_err(|_| ParamError::invalid(key, raw, expected))
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
