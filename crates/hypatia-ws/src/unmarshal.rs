//! Request body unmarshalling.

use hypatia_core::RequestContext;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// The request body could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct UnmarshalError {
    message: String,
}

impl UnmarshalError {
    /// Creates an error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the parser's description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Populates a request body target from the raw request body.
pub trait Unmarshaller<B>: Send + Sync {
    /// Parses `raw` into `target`.
    fn unmarshal(
        &self,
        ctx: &RequestContext,
        raw: &[u8],
        target: &mut B,
    ) -> Result<(), UnmarshalError>;
}

/// Parses JSON request bodies.
///
/// An empty or whitespace-only body leaves the target untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonUnmarshaller;

impl<B: DeserializeOwned> Unmarshaller<B> for JsonUnmarshaller {
    fn unmarshal(
        &self,
        _ctx: &RequestContext,
        raw: &[u8],
        target: &mut B,
    ) -> Result<(), UnmarshalError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        *target = serde_json::from_slice(raw).map_err(|e| UnmarshalError::new(e.to_string()))?;
        Ok(())
    }
}
