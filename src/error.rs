use std::sync::Arc;

use reqwest::StatusCode;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while fetching flag definitions, calling the decide endpoint, or managing the
/// poller thread.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A flag could not be evaluated locally.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Invalid host configuration.
    #[error("invalid host configuration")]
    InvalidHost(#[source] url::ParseError),

    /// The server rejected the credentials.
    #[error("unauthorized, personal_api_key is likely invalid")]
    Unauthorized,

    /// The server answered with a non-success status.
    #[error("unexpected response status: {0}")]
    Status(StatusCode),

    /// Network error.
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Transport(Arc<reqwest::Error>),

    /// Response body could not be decoded.
    #[error("malformed response body")]
    Decode(#[source] Arc<serde_json::Error>),

    /// An I/O error.
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        // Urls carry the project token as a query parameter.
        Error::Transport(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}

/// Failure to evaluate a single flag for a single subject.
///
/// These never escape the high-level [`Client`](crate::Client) methods: the caller's default value
/// is returned instead and the error is logged.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvaluationError {
    /// The property bag has no value for a condition that needs one.
    #[error("can't match property {key:?} without a given property value")]
    MissingProperty {
        /// Property name.
        key: String,
    },

    /// A comparison operator was applied to a value that is not a number.
    #[error("property {key:?} is not orderable")]
    NotOrderable {
        /// Property name.
        key: String,
    },

    /// A string operator was applied to a value that is not a string.
    #[error("property {key:?} must be a string")]
    TypeMismatch {
        /// Property name.
        key: String,
    },

    /// Regular expression in a condition failed to compile.
    #[error("invalid regex {pattern:?}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
    },

    /// The operator is known but cannot be evaluated locally.
    #[error("can't match properties with operator {operator}")]
    UnsupportedOperator {
        /// Operator name as sent by the server.
        operator: &'static str,
    },

    /// Digest could not be converted to a bucket value.
    #[error("internal error converting hash to a number")]
    InternalHash,
}
