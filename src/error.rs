//! Error types for xmldom
//!
//! Every helper in this crate reports failures through [`Error`]. The variants
//! are coarse on purpose: a malformed document and an unreadable stream are
//! both [`Error::InvalidInput`], and callers that care can inspect the wrapped
//! source.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::xpath::XPathError;

/// Result type alias using xmldom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause of an [`Error::InvalidInput`]
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for xmldom operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input could not be parsed (malformed XML, unreadable stream, bad encoding)
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human readable summary
        message: String,
        /// Underlying cause
        #[source]
        source: Option<Cause>,
    },

    /// Input file does not exist
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// XPath compilation or evaluation failure
    #[error(transparent)]
    Query(#[from] XPathError),

    /// A query expected to match at most one node matched several
    #[error("XPath result is more than 1 element - xpath: '{expression}' size: {size}")]
    Cardinality {
        /// The offending expression
        expression: String,
        /// Number of matched nodes
        size: usize,
    },

    /// Invalid helper configuration (namespace resolvers, output properties)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an argument the helper refuses
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Tree edit that would produce an impossible structure
    #[error("hierarchy error: {0}")]
    Hierarchy(String),

    /// Invalid XML name
    #[error("name error: {0}")]
    Name(String),

    /// Parser limit exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Schema document could not be loaded
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Document is not valid against a schema
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization failure
    #[error("unable to transform dom to xml: {0}")]
    Serialize(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid-input error without an underlying cause
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid-input error wrapping its cause
    pub fn invalid_input_from<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<Cause>,
    {
        Error::InvalidInput {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// Error for a node handle that no longer (or never did) belong to a document
    pub(crate) fn unknown_node() -> Self {
        Error::Hierarchy("node does not belong to this document".to_string())
    }
}

/// XML Schema validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the element that failed validation
    pub path: Option<String>,
    /// Offending value, if any
    pub instance: Option<String>,
    /// Underlying reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            instance: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the instance snippet
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref instance) = self.instance {
            write!(f, "\n\nInstance: {}", instance)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// XML Schema loading error
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error message
    pub message: String,
    /// Schema file or component that caused the error
    pub location: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, " (at {})", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("Element 'foo' is not valid")
            .with_reason("Required element 'bar' is missing")
            .with_path("/root/foo")
            .with_instance("<foo/>");

        let msg = format!("{}", err);
        assert!(msg.contains("Element 'foo' is not valid"));
        assert!(msg.contains("Reason:"));
        assert!(msg.contains("Path: /root/foo"));
        assert!(msg.contains("Instance:"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::new("unknown type 'xs:foo'").with_location("schema.xsd");
        assert_eq!(err.to_string(), "unknown type 'xs:foo' (at schema.xsd)");
    }

    #[test]
    fn test_invalid_input_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::invalid_input_from("Unable to parse from input stream", io);

        assert!(matches!(err, Error::InvalidInput { .. }));
        let cause = err.source().expect("cause should be kept");
        assert_eq!(cause.to_string(), "truncated");
    }

    #[test]
    fn test_cardinality_message() {
        let err = Error::Cardinality {
            expression: "//element".to_string(),
            size: 3,
        };
        assert_eq!(
            err.to_string(),
            "XPath result is more than 1 element - xpath: '//element' size: 3"
        );
    }

    #[test]
    fn test_error_conversion() {
        let val_err = ValidationError::new("test");
        let err: Error = val_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
