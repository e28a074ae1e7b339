//! Error types for the type model.

use thiserror::Error;

/// Errors raised while deriving descriptors or converting values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The type name is neither built in nor registered.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A generic or array type name could not be parsed.
    #[error("malformed type name: {0}")]
    MalformedTypeName(String),

    /// A custom serializer key was referenced but never registered.
    #[error("no custom serializer registered under '{0}'")]
    UnknownSerializer(String),

    /// An enum value does not name a variant (or variant alias) of its type.
    #[error("'{value}' is not a variant of enum {type_name}")]
    UnknownVariant { type_name: String, value: String },

    /// Text could not be converted to the requested scalar type.
    #[error("cannot parse '{text}' as {type_name}")]
    Parse { text: String, type_name: String },

    /// A value of the wrong runtime type was handed to a codec.
    #[error("expected a value of type {expected}, got {actual}")]
    UnexpectedValue { expected: String, actual: String },

    /// Failure reported by a custom serializer or known-type codec.
    #[error("{0}")]
    Custom(String),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
