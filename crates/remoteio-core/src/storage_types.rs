use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Where a location's bytes live.
///
/// Every location handled by remoteio resolves to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    pub const ALL: [StorageBackend; 2] = [StorageBackend::S3, StorageBackend::Local];

    /// True when reaching the backend needs the shared remote client.
    pub fn is_remote(self) -> bool {
        matches!(self, StorageBackend::S3)
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "remote" => Ok(StorageBackend::S3),
            "local" | "file" | "fs" => Ok(StorageBackend::Local),
            other => Err(anyhow::anyhow!(
                "Unknown storage backend '{}' (expected s3 or local)",
                other
            )),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Local => "local",
        })
    }
}
