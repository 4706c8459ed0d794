use crate::context::IoContext;
use crate::copy::{copy_chunked, DEFAULT_CHUNK_SIZE};
use crate::traits::{StorageError, StorageResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Local filesystem writer
///
/// Writes go to a hidden sibling file and are renamed into place only after
/// the copy and fsync succeed, so a failed write never leaves a truncated
/// file under the destination name.
#[derive(Clone, Debug)]
pub struct LocalWriter {
    chunk_size: usize,
}

impl Default for LocalWriter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl LocalWriter {
    pub fn new(chunk_size: usize) -> Self {
        LocalWriter { chunk_size }
    }

    /// Stream `source` into the file at `path`, creating parent directories.
    ///
    /// Returns the number of bytes written.
    pub async fn write_to_local<R>(
        &self,
        ctx: &IoContext,
        path: impl AsRef<Path>,
        source: &mut R,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = path.as_ref();
        let location = path.display().to_string();
        let start = std::time::Instant::now();

        ctx.check("write", &location)?;
        tracing::info!(path = %location, "Local write started");

        self.ensure_parent_dir(path, &location).await?;

        let partial = partial_path(path);
        let result = self
            .write_partial(ctx, &partial, &location, source)
            .await;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            error = %cleanup,
                            path = %partial.display(),
                            "Failed to remove partial file"
                        );
                    }
                }
                tracing::error!(
                    error = %e,
                    path = %location,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local write failed"
                );
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial, path).await {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                tracing::warn!(
                    error = %cleanup,
                    path = %partial.display(),
                    "Failed to remove partial file"
                );
            }
            tracing::error!(error = %e, path = %location, "Local rename failed");
            return Err(StorageError::WriteFailed {
                location,
                source: Box::new(e),
            });
        }

        tracing::info!(
            path = %location,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local write completed"
        );

        Ok(written)
    }

    async fn write_partial<R>(
        &self,
        ctx: &IoContext,
        partial: &Path,
        location: &str,
        source: &mut R,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = fs::File::create(partial)
            .await
            .map_err(|e| write_failed(location, e))?;

        let written = copy_chunked(ctx, location, source, &mut file, self.chunk_size).await?;

        file.flush().await.map_err(|e| write_failed(location, e))?;
        file.sync_all().await.map_err(|e| write_failed(location, e))?;

        Ok(written)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path, location: &str) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        dir = %parent.display(),
                        "Failed to create output directory"
                    );
                    write_failed(location, e)
                })?;
            }
        }
        Ok(())
    }
}

/// `dir/name` -> `dir/.name.<uuid>.partial`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| path.as_os_str()));
    name.push(format!(".{}.partial", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

fn write_failed(location: &str, err: std::io::Error) -> StorageError {
    StorageError::WriteFailed {
        location: location.to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::test_support::LazySource;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c/out.txt");
        let data = b"local payload".to_vec();

        let written = LocalWriter::default()
            .write_to_local(&IoContext::background(), &path, &mut data.as_slice())
            .await
            .unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old content that is longer").unwrap();

        LocalWriter::default()
            .write_to_local(&IoContext::background(), &path, &mut &b"new"[..])
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut source = LazySource::failing_after(1024 * 1024, 10_000);

        let err = LocalWriter::new(1024)
            .write_to_local(&IoContext::background(), &path, &mut source)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::WriteFailed { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let ctx = IoContext::background();
        ctx.cancel();

        let err = LocalWriter::default()
            .write_to_local(&ctx, &path, &mut &b"data"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Cancelled { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let partial = partial_path(Path::new("/tmp/out/file.txt"));
        assert_eq!(partial.parent(), Some(Path::new("/tmp/out")));
        let name = partial.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".file.txt."));
        assert!(name.ends_with(".partial"));
    }
}
