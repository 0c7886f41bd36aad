//! Error types for Glosser
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::host::{DomError, ObserveError};

/// All error types that can occur in Glosser
#[derive(Debug, Error)]
pub enum GlosserError {
    /// Tree operation failed
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    /// A notification primitive could not be attached
    #[error("Observer error: {0}")]
    Observe(#[from] ObserveError),

    /// Annotation service error
    #[error("Annotation error: {0}")]
    Annotate(#[from] AnnotateError),

    /// Page fixture could not be loaded
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// Invalid scheduler state for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Glosser operations
pub type Result<T> = std::result::Result<T, GlosserError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NodeId;

    #[test]
    fn test_fixture_error() {
        let err = GlosserError::Fixture("missing body".to_string());
        assert_eq!(err.to_string(), "Fixture error: missing body");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = GlosserError::InvalidState("scheduler disabled".to_string());
        assert_eq!(err.to_string(), "Invalid state: scheduler disabled");
    }

    #[test]
    fn test_dom_error_conversion() {
        let err: GlosserError = DomError::Detached(NodeId::from_raw(7)).into();
        assert!(matches!(err, GlosserError::Dom(_)));
        assert!(err.to_string().contains("#7"));
    }

    #[test]
    fn test_observe_error_conversion() {
        let err: GlosserError = ObserveError::NotReady.into();
        assert!(matches!(err, GlosserError::Observe(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GlosserError = io_err.into();
        assert!(matches!(err, GlosserError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{ not: a list").unwrap_err();
        let err: GlosserError = yaml_err.into();
        assert!(matches!(err, GlosserError::Yaml(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(GlosserError::InvalidState("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
