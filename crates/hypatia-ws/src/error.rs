//! Error types for handler construction and response writing.

use thiserror::Error;

/// A failure while writing a response.
///
/// Write failures are the terminal outcome of a request; they are returned
/// to the caller of [`WsHandler::serve`](crate::WsHandler::serve) and never retried.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The response data could not be serialised.
    #[error("failed to marshal response: {0}")]
    Marshal(#[from] serde_json::Error),

    /// The output sink rejected the write.
    #[error("failed to write response: {0}")]
    Sink(String),
}

impl WriteError {
    /// Creates a sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink(message.into())
    }
}

/// A misconfigured handler, detected when the handler is built.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// The handler has no name.
    #[error("handler name must not be empty")]
    MissingName,

    /// The path pattern is not a valid regular expression.
    #[error("invalid path pattern '{pattern}': {source}")]
    InvalidPathPattern {
        /// The rejected pattern.
        pattern: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// Path targets were configured without a path pattern to capture them.
    #[error("path targets require a path pattern")]
    PathTargetsWithoutPattern,

    /// More path targets than the pattern has capture groups.
    #[error("{targets} path targets but the pattern has {groups} capture groups")]
    TooManyPathTargets {
        /// Number of configured targets.
        targets: usize,
        /// Number of capture groups in the pattern.
        groups: usize,
    },

    /// A path or query target names a field the body cannot bind.
    #[error("'{field}' is not a bindable field of the request body")]
    UnknownBindField {
        /// The field name.
        field: String,
    },
}
