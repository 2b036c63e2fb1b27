//! Error types for query composition, execution and projection.
//!
//! `QueryError` is the single error surfaced by the engine. Build-time
//! variants come from specification construction, `TooManyResults` from
//! execution, and the projection variants from row mapping. Failures raised by
//! the storage collaborator travel through [`QueryError::Storage`] untouched.

use std::fmt;

/// Error raised by a storage collaborator
///
/// The engine never inspects or retries these; it only wraps them so callers
/// see one error type.
#[derive(Debug)]
pub struct StorageError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StorageError {
    /// Create a storage error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying driver error, keeping it as the error source
    pub fn from_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message reported by the store
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Query engine error type
#[derive(Debug)]
pub enum QueryError {
    /// Entity name not registered in the catalog
    UnknownEntity(String),
    /// Attribute path segment missing on an entity or relationship target
    UnknownAttribute { entity: String, attribute: String },
    /// Join over something that is not a relationship, or with a bad target
    InvalidJoin(String),
    /// Grouping, ordering or aggregate placement that cannot be executed
    InvalidAggregationSpec(String),
    /// Literal or operand type incompatible with the expression it meets
    TypeMismatch { expected: String, found: String },
    /// Bulk update with no assignments
    EmptyUpdate(String),
    /// `fetch_one` saw more than one row
    TooManyResults(usize),
    /// Accessor projection into a type that cannot be default-constructed
    NoDefaultConstructor(String),
    /// Constructor projection whose columns do not line up with the parameters
    ConstructorArityMismatch { target: String, reason: String },
    /// A row value could not be converted to the requested Rust type
    Conversion(String),
    /// Storage collaborator failure, passed through unmodified
    Storage(StorageError),
    /// Configuration could not be loaded
    Config(config::ConfigError),
}

impl QueryError {
    pub(crate) fn unknown_attribute(entity: &str, attribute: &str) -> Self {
        QueryError::UnknownAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        QueryError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// True for errors raised while building a specification
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            QueryError::UnknownEntity(_)
                | QueryError::UnknownAttribute { .. }
                | QueryError::InvalidJoin(_)
                | QueryError::InvalidAggregationSpec(_)
                | QueryError::TypeMismatch { .. }
                | QueryError::EmptyUpdate(_)
                | QueryError::ConstructorArityMismatch { .. }
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::UnknownEntity(name) => write!(f, "Unknown entity: {name}"),
            QueryError::UnknownAttribute { entity, attribute } => {
                write!(f, "Unknown attribute: {entity}.{attribute}")
            }
            QueryError::InvalidJoin(s) => write!(f, "Invalid join: {s}"),
            QueryError::InvalidAggregationSpec(s) => {
                write!(f, "Invalid aggregation spec: {s}")
            }
            QueryError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}")
            }
            QueryError::EmptyUpdate(entity) => {
                write!(f, "Update of {entity} has no assignments")
            }
            QueryError::TooManyResults(n) => {
                write!(f, "Too many results: expected at most one row, got {n}")
            }
            QueryError::NoDefaultConstructor(target) => {
                write!(f, "No default constructor for projection target {target}")
            }
            QueryError::ConstructorArityMismatch { target, reason } => {
                write!(f, "Constructor mismatch for {target}: {reason}")
            }
            QueryError::Conversion(s) => write!(f, "Conversion error: {s}"),
            QueryError::Storage(e) => write!(f, "Storage error: {e}"),
            QueryError::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Storage(e) => Some(e),
            QueryError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        QueryError::Storage(err)
    }
}

impl From<config::ConfigError> for QueryError {
    fn from(err: config::ConfigError) -> Self {
        QueryError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = QueryError::unknown_attribute("Member", "nickname");
        assert_eq!(err.to_string(), "Unknown attribute: Member.nickname");

        let err = QueryError::TooManyResults(4);
        assert!(err.to_string().contains("got 4"));
    }

    #[test]
    fn test_build_error_classification() {
        assert!(QueryError::InvalidJoin("x".into()).is_build_error());
        assert!(QueryError::InvalidAggregationSpec("x".into()).is_build_error());
        assert!(!QueryError::TooManyResults(2).is_build_error());
        assert!(!QueryError::NoDefaultConstructor("Dto".into()).is_build_error());
    }

    #[test]
    fn test_storage_error_passes_through() {
        let err: QueryError = StorageError::new("constraint violated").into();
        match &err {
            QueryError::Storage(inner) => assert_eq!(inner.message(), "constraint violated"),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = StorageError::from_source("query failed", io);
        assert_eq!(err.to_string(), "query failed: timed out");
        assert!(std::error::Error::source(&err).is_some());
    }
}
