//! Location classification and remote reference parsing.
//!
//! Classification is total: a string is a remote reference iff it starts with
//! [`REMOTE_SCHEME`], otherwise it is a local path. Parsing is separate from
//! validation; a container-only reference parses with an empty key and it is
//! up to the reader/writer to reject it.

use crate::traits::{StorageError, StorageResult};
use remoteio_core::StorageBackend;
use std::fmt;
use std::path::PathBuf;

/// Reserved scheme prefix for remote objects (case-sensitive).
pub const REMOTE_SCHEME: &str = "s3://";

/// True iff `location` begins with the remote scheme prefix.
pub fn is_remote(location: &str) -> bool {
    location.starts_with(REMOTE_SCHEME)
}

/// Split a remote location into `(container, key)`.
///
/// `s3://bucket` yields `("bucket", "")`. A missing prefix or an empty
/// container is an `InvalidReference`.
pub fn parse_remote(location: &str) -> StorageResult<(String, String)> {
    let rest = location.strip_prefix(REMOTE_SCHEME).ok_or_else(|| {
        StorageError::invalid_reference(location, format!("must start with '{}'", REMOTE_SCHEME))
    })?;

    let (container, key) = match rest.split_once('/') {
        Some((container, key)) => (container, key),
        None => (rest, ""),
    };

    if container.is_empty() {
        return Err(StorageError::invalid_reference(location, "container is empty"));
    }

    Ok((container.to_string(), key.to_string()))
}

/// A parsed remote object reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    pub container: String,
    pub key: String,
}

impl RemoteRef {
    pub fn parse(location: &str) -> StorageResult<Self> {
        let (container, key) = parse_remote(location)?;
        Ok(RemoteRef { container, key })
    }

    /// Parse and require a key, for operations on a single object.
    pub fn parse_object(location: &str) -> StorageResult<Self> {
        let reference = Self::parse(location)?;
        if reference.key.is_empty() {
            return Err(StorageError::invalid_reference(
                location,
                "object key is empty; a single object is required, not a container",
            ));
        }
        Ok(reference)
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", REMOTE_SCHEME, self.container, self.key)
    }
}

/// A classified location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Remote location, still unparsed
    Remote(String),
    /// Local filesystem path
    Local(PathBuf),
}

impl Location {
    pub fn classify(location: &str) -> Self {
        if is_remote(location) {
            Location::Remote(location.to_string())
        } else {
            Location::Local(PathBuf::from(location))
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Location::Remote(_) => StorageBackend::S3,
            Location::Local(_) => StorageBackend::Local,
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            Location::Remote(uri) => uri.clone(),
            Location::Local(path) => path.display().to_string(),
        }
    }
}
