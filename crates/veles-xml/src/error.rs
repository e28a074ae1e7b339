//! Error types for XML tree reading and writing.

use thiserror::Error;

/// Errors that can occur when reading or writing XML documents.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// XML syntax error reported by the tokenizer.
    #[error("XML error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// The document contains no root element.
    #[error("no root element found in XML")]
    NoRoot,

    /// An element or attribute uses a prefix with no `xmlns` declaration in scope.
    #[error("namespace prefix '{0}' is not declared")]
    UnboundPrefix(String),

    /// Closing tag does not match the open element.
    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },

    /// XML writing error.
    #[error("XML write error: {0}")]
    Write(String),
}

/// Result type for XML tree operations.
pub type Result<T> = std::result::Result<T, Error>;
