//! Storage error taxonomy and the remote connector seam
//!
//! Every fallible operation in this crate returns [`StorageError`]. Variants
//! carry the operation and location they failed on so callers can report
//! them without consulting logs.

use async_trait::async_trait;
use object_store::ObjectStore;
use std::sync::Arc;
use thiserror::Error;

/// Boxed underlying cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid reference {location:?}: {reason}")]
    InvalidReference { location: String, reason: String },

    #[error("Not found: {location}")]
    NotFound {
        location: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Access denied: {location}")]
    AccessDenied {
        location: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Remote client initialization failed: {message}")]
    InitializationFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Remote backend unavailable for {operation} on {location}: client is {state}")]
    BackendUnavailable {
        operation: &'static str,
        location: String,
        state: &'static str,
    },

    #[error("Client factory is closed, cannot {operation}")]
    FactoryClosed { operation: &'static str },

    #[error("Failed to open {location}")]
    OpenFailed {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("Write to {location} failed")]
    WriteFailed {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("Commit of {location} failed after data was transmitted")]
    CommitFailed {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("{operation} on {location} was cancelled")]
    Cancelled {
        operation: &'static str,
        location: String,
    },

    #[error("{operation} on {location} exceeded its deadline")]
    DeadlineExceeded {
        operation: &'static str,
        location: String,
    },
}

impl StorageError {
    pub(crate) fn invalid_reference(location: &str, reason: impl Into<String>) -> Self {
        StorageError::InvalidReference {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    /// Map an object store error raised while opening `location`.
    pub(crate) fn from_remote_open(location: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StorageError::NotFound {
                location: location.to_string(),
                source: Some(Box::new(err)),
            },
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => StorageError::AccessDenied {
                location: location.to_string(),
                source: Some(Box::new(err)),
            },
            other => StorageError::OpenFailed {
                location: location.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Map a filesystem error raised while opening `location`.
    pub(crate) fn from_local_open(location: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                location: location.to_string(),
                source: Some(Box::new(err)),
            },
            std::io::ErrorKind::PermissionDenied => StorageError::AccessDenied {
                location: location.to_string(),
                source: Some(Box::new(err)),
            },
            _ => StorageError::OpenFailed {
                location: location.to_string(),
                source: Box::new(err),
            },
        }
    }

    /// True for `Cancelled` and `DeadlineExceeded`.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            StorageError::Cancelled { .. } | StorageError::DeadlineExceeded { .. }
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Produces object stores for the remote backend.
///
/// A connector is owned by exactly one [`crate::RemoteClient`]. Stores it
/// returns are bound to a single container and are safe to use concurrently.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open (or reuse) a store for `container`.
    async fn connect(&self, container: &str) -> Result<Arc<dyn ObjectStore>, object_store::Error>;

    /// Release connector-wide resources. Called once, when the client is closed.
    async fn release(&self) {}

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_kinds() {
        let cancelled = StorageError::Cancelled {
            operation: "open",
            location: "s3://b/k".to_string(),
        };
        let expired = StorageError::DeadlineExceeded {
            operation: "open",
            location: "s3://b/k".to_string(),
        };
        assert!(cancelled.is_interrupted());
        assert!(expired.is_interrupted());
        assert!(!StorageError::FactoryClosed { operation: "open" }.is_interrupted());
    }

    #[test]
    fn test_local_open_error_mapping() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            StorageError::from_local_open("/x", missing),
            StorageError::NotFound { .. }
        ));
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            StorageError::from_local_open("/x", denied),
            StorageError::AccessDenied { .. }
        ));
    }
}
