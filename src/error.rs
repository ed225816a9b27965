//! Error types for the entity crate.

use std::io;
use thiserror::Error;

/// The main error type for entity body operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed Content-Type or Content-Disposition value.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed multipart structure, a non-composite entity where parts were
    /// requested, or an I/O failure while decoding or encoding parts.
    #[error("Parser error: {0}")]
    Parser(String),

    /// Materialization requested without a byte source.
    #[error("No content: {0}")]
    NoContent(String),

    /// Base64 or charset decode failure.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Charset encode failure.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Body bytes are not a valid JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Body bytes are not a well-formed XML document.
    #[error("XML error: {0}")]
    Xml(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Header block exceeds the configured limits.
    #[error("Message too large")]
    MessageTooLarge,
}

/// Specialized Result type for entity operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl Error {
    /// Wraps any error as a [`Error::Parser`] with a context prefix.
    ///
    /// Parser errors are not double-wrapped; their message is reused.
    pub(crate) fn parser(context: &str, cause: Error) -> Self {
        match cause {
            Error::Parser(msg) => Error::Parser(format!("{context}{msg}")),
            other => Error::Parser(format!("{context}{other}")),
        }
    }
}
