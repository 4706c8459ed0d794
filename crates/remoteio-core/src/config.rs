//! Configuration module
//!
//! Settings for the remote client and the streaming transfer path. Values come
//! from the process environment (optionally seeded from a `.env` file).
//! Credentials are not part of it; the S3 client resolves them from the
//! ambient environment itself.

use std::env;
use std::path::Path;

const INIT_TIMEOUT_SECS: u64 = 10;
const CHUNK_SIZE_BYTES: usize = 64 * 1024;
const UPLOAD_BUFFER_BYTES: usize = 10 * 1024 * 1024;
/// Smallest multipart part size S3 accepts.
pub const MIN_UPLOAD_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Remote I/O configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteIoConfig {
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub init_timeout_secs: u64,
    pub chunk_size_bytes: usize,
    pub upload_buffer_bytes: usize,
}

impl Default for RemoteIoConfig {
    fn default() -> Self {
        RemoteIoConfig {
            s3_region: None,
            s3_endpoint: None,
            init_timeout_secs: INIT_TIMEOUT_SECS,
            chunk_size_bytes: CHUNK_SIZE_BYTES,
            upload_buffer_bytes: UPLOAD_BUFFER_BYTES,
        }
    }
}

impl RemoteIoConfig {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load a specific env file into the process environment, then read the config.
    pub fn from_env_file(path: &Path) -> Result<Self, anyhow::Error> {
        dotenvy::from_path(path).map_err(|e| {
            anyhow::anyhow!("Failed to load config file {}: {}", path.display(), e)
        })?;
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = RemoteIoConfig {
            s3_region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|s| !s.trim().is_empty()),
            init_timeout_secs: parse_or(&lookup, "REMOTEIO_INIT_TIMEOUT_SECS", INIT_TIMEOUT_SECS)?,
            chunk_size_bytes: parse_or(&lookup, "REMOTEIO_CHUNK_SIZE_BYTES", CHUNK_SIZE_BYTES)?,
            upload_buffer_bytes: parse_or(
                &lookup,
                "REMOTEIO_UPLOAD_BUFFER_BYTES",
                UPLOAD_BUFFER_BYTES,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "REMOTEIO_CHUNK_SIZE_BYTES must be greater than zero"
            ));
        }

        if self.upload_buffer_bytes < MIN_UPLOAD_BUFFER_BYTES {
            return Err(anyhow::anyhow!(
                "REMOTEIO_UPLOAD_BUFFER_BYTES must be at least {} bytes",
                MIN_UPLOAD_BUFFER_BYTES
            ));
        }

        if let Some(ref endpoint) = self.s3_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "S3_ENDPOINT must start with http:// or https://"
                ));
            }
        }

        Ok(())
    }

    /// Plain-HTTP endpoints (local MinIO and friends) need insecure transport enabled.
    pub fn allow_http(&self) -> bool {
        self.s3_endpoint
            .as_deref()
            .is_some_and(|e| e.starts_with("http://"))
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        None => Ok(default),
    }
}
