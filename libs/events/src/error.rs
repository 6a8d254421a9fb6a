//! Error types for notification handling.

use thiserror::Error;

/// A delivery body that could not be turned into a notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The body is not a JSON object of the expected shape.
    #[error("payload is not a valid notification object: {0}")]
    InvalidJson(String),

    /// The JSON object carries no `type` tag.
    #[error("notification is missing the 'type' field")]
    MissingType,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::InvalidJson(err.to_string())
    }
}

/// A subscription binding that cannot be expressed on a topic exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// A name used to build the binding is empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A routing-key segment contains a separator or wildcard.
    #[error("{field} '{value}' must not contain '.', '*' or '#'")]
    InvalidSegment { field: &'static str, value: String },
}
