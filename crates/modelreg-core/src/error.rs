//! Error types for the model registry.
//!
//! Lookups of unknown ids are not errors: they come back as `None` or
//! `false`. Everything here is a failure the caller has to act on.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Storage errors
    #[error("Persistence error at {path:?}: {message}")]
    Persistence {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Corrupt registry state in {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Catalog rules
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Persistence {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RegistryError {
    /// Build a persistence error with a custom message.
    pub(crate) fn persistence(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        RegistryError::Persistence {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// The registry never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::Persistence { .. } | RegistryError::Lock(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::Validation {
            field: "path".into(),
            message: "must not be empty".into(),
        };
        assert_eq!(err.to_string(), "Validation error for path: must not be empty");

        let err = RegistryError::CorruptState {
            path: PathBuf::from("/reg/metadata.json"),
            message: "expected value at line 1 column 1".into(),
        };
        assert!(err.to_string().contains("/reg/metadata.json"));
    }

    #[test]
    fn test_io_conversion_is_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RegistryError = io.into();
        assert!(matches!(err, RegistryError::Persistence { path: None, .. }));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = RegistryError::persistence("Failed to read /tmp/x", "/tmp/x", io);
        match err {
            RegistryError::Persistence { path, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/x")))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(RegistryError::from(io).is_retryable());
        assert!(RegistryError::Lock("poisoned".into()).is_retryable());
        assert!(!RegistryError::InvariantViolation {
            message: "two production models".into()
        }
        .is_retryable());
    }
}
