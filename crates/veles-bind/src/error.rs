//! Error types for serialization and deserialization.
//!
//! Problems found while processing a document are recorded in
//! [`ParsingErrors`] with a [`Severity`]; whether a recorded problem also
//! aborts the operation is decided by the serializer's
//! [`ExceptionPolicy`](veles_model::ExceptionPolicy).

use std::fmt;

use thiserror::Error;
use veles_model::{ModelError, Severity};

/// Errors raised by the serializer and deserializer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The value's runtime type cannot be stored in the declared type.
    #[error("object of type {actual} does not match the expected type {expected}")]
    ObjectTypeMismatch { expected: String, actual: String },

    /// Text could not be converted to the member's type.
    #[error("badly formed input for {member}: '{value}' is not a valid {expected}")]
    BadlyFormedInput {
        member: String,
        expected: String,
        value: String,
    },

    /// A member's element was not found.
    #[error("element {element} is missing under {path}")]
    ElementMissing { path: String, element: String },

    /// A member's attribute was not found.
    #[error("attribute {attribute} is missing on {path}")]
    AttributeMissing { path: String, attribute: String },

    /// The element holding a member's value has no text.
    #[error("element {path} has no value for {member}")]
    ElementValueMissing { path: String, member: String },

    /// Two members map to the same attribute.
    #[error("attribute {attribute} already exists on {path}")]
    AttributeAlreadyExists { path: String, attribute: String },

    /// A location path cannot be resolved.
    #[error("location '{location}' cannot be resolved from {path}")]
    BadLocation { path: String, location: String },

    /// An item was rejected by its collection.
    #[error("cannot add {item} to collection {collection}")]
    CannotAddObjectToCollection { collection: String, item: String },

    /// A deserialized value cannot be stored in its member.
    #[error("value of type {actual} cannot be assigned to {member} of type {expected}")]
    PropertyCannotBeAssignedTo {
        member: String,
        expected: String,
        actual: String,
    },

    /// A configured default cannot be converted to the member's type.
    #[error("default value {value} cannot be assigned to {member}")]
    DefaultValueCannotBeAssigned { member: String, value: String },

    /// The object graph references itself and the type forbids cycles.
    #[error("cannot serialize self-referential object of type {type_name}")]
    CannotSerializeSelfReferentialTypes { type_name: String },

    /// The input is not well-formed XML.
    #[error("badly formed XML: {0}")]
    BadlyFormedXml(String),

    /// Failure writing or reading the XML text.
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Type model error.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<veles_xml::Error> for Error {
    fn from(e: veles_xml::Error) -> Self {
        match e {
            veles_xml::Error::Io(io) => Self::Io(io.to_string()),
            other => Self::Xml(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for serializer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A recorded problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsingError {
    /// How serious the problem is.
    pub severity: Severity,
    /// The problem.
    pub error: Error,
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Ignore => "ignored",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}] {}", level, self.error)
    }
}

/// Problems recorded during the last operation, in order of discovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsingErrors {
    entries: Vec<ParsingError>,
}

impl ParsingErrors {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem.
    pub fn push(&mut self, error: Error, severity: Severity) {
        self.entries.push(ParsingError { severity, error });
    }

    /// Number of recorded problems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if any problem has error severity.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    /// Check if any problem has warning severity.
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Warning)
    }

    /// Iterate over recorded problems.
    pub fn iter(&self) -> std::slice::Iter<'_, ParsingError> {
        self.entries.iter()
    }

    /// Forget all recorded problems.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a ParsingErrors {
    type Item = &'a ParsingError;
    type IntoIter = std::slice::Iter<'a, ParsingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for ParsingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsing_errors() {
        let mut errors = ParsingErrors::new();
        assert!(errors.is_empty());

        errors.push(
            Error::ElementMissing {
                path: "/Person".into(),
                element: "Age".into(),
            },
            Severity::Warning,
        );
        assert!(errors.has_warnings());
        assert!(!errors.has_errors());

        errors.push(Error::BadlyFormedXml("eof".into()), Severity::Error);
        assert!(errors.has_errors());
        assert_eq!(errors.len(), 2);

        let text = errors.to_string();
        assert!(text.starts_with("[warning] element Age is missing under /Person"));
        assert!(text.contains("[error] badly formed XML: eof"));

        errors.clear();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_from_xml_error() {
        let err: Error = veles_xml::Error::NoRoot.into();
        assert!(matches!(err, Error::Xml(_)));
    }
}
