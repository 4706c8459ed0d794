use crate::client::ClientHandle;
use crate::context::IoContext;
use crate::traits::{StorageError, StorageResult};
use crate::uri::{Location, RemoteRef};
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStoreExt;
use remoteio_core::StorageBackend;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;
use tokio_util::io::StreamReader;
use tokio_util::sync::WaitForCancellationFutureOwned;

/// Opens readable streams for local paths and remote objects.
///
/// Cheap to clone; all clones share the factory's remote client.
#[derive(Clone, Debug)]
pub struct InputReader {
    pub(crate) client: ClientHandle,
}

impl InputReader {
    pub fn new(client: ClientHandle) -> Self {
        InputReader { client }
    }

    /// A reader with no remote client. Remote locations fail with `BackendUnavailable`.
    pub fn local_only() -> Self {
        InputReader {
            client: ClientHandle::uninitialized(),
        }
    }

    /// Open `location` for reading.
    ///
    /// Only a handle is returned; nothing is read ahead. The caller owns the
    /// stream and releases it by dropping it or calling [`ReadStream::close`].
    pub async fn open(&self, ctx: &IoContext, location: &str) -> StorageResult<ReadStream> {
        match Location::classify(location) {
            Location::Remote(uri) => self.open_remote(ctx, &uri).await,
            Location::Local(path) => self.open_local(ctx, &path, location).await,
        }
    }

    async fn open_remote(&self, ctx: &IoContext, location: &str) -> StorageResult<ReadStream> {
        let reference = RemoteRef::parse_object(location)?;
        let client = self.client.acquire("open", location).await?;
        let start = std::time::Instant::now();

        let result = ctx
            .run("open", location, async {
                let store = client
                    .store(&reference.container)
                    .await
                    .map_err(|e| StorageError::from_remote_open(location, e))?;
                store
                    .get(&ObjectPath::from(reference.key.as_str()))
                    .await
                    .map_err(|e| StorageError::from_remote_open(location, e))
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %reference.container,
                    key = %reference.key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote open failed"
                );
            })?;

        tracing::info!(
            bucket = %reference.container,
            key = %reference.key,
            size_bytes = result.meta.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote object opened"
        );

        let body = result.into_stream().map_err(io::Error::other);
        Ok(ReadStream::new(
            ctx,
            StorageBackend::S3,
            location,
            Box::pin(StreamReader::new(body)),
        ))
    }

    async fn open_local(
        &self,
        ctx: &IoContext,
        path: &Path,
        location: &str,
    ) -> StorageResult<ReadStream> {
        let file = ctx
            .run("open", location, async {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| StorageError::from_local_open(location, e))?;
                let meta = file
                    .metadata()
                    .await
                    .map_err(|e| StorageError::from_local_open(location, e))?;
                if meta.is_dir() {
                    return Err(StorageError::OpenFailed {
                        location: location.to_string(),
                        source: Box::new(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "path is a directory",
                        )),
                    });
                }
                tracing::info!(
                    path = %path.display(),
                    size_bytes = meta.len(),
                    "Local file opened"
                );
                Ok(file)
            })
            .await?;

        Ok(ReadStream::new(
            ctx,
            StorageBackend::Local,
            location,
            Box::pin(file),
        ))
    }
}

/// An open byte stream with a single owner.
///
/// Reads fail with `Interrupted` once the opening context is cancelled and
/// with `TimedOut` once its deadline passes. Dropping the stream releases the
/// backend resource.
pub struct ReadStream {
    inner: Pin<Box<dyn AsyncRead + Send>>,
    backend: StorageBackend,
    location: String,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl ReadStream {
    fn new(
        ctx: &IoContext,
        backend: StorageBackend,
        location: &str,
        inner: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Self {
        ReadStream {
            inner,
            backend,
            location: location.to_string(),
            cancelled: Box::pin(ctx.token().clone().cancelled_owned()),
            deadline: ctx
                .deadline()
                .map(|deadline| Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Release the stream now.
    pub fn close(self) {
        drop(self);
    }
}

impl AsyncRead for ReadStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                format!("read of {} cancelled", this.location),
            )));
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read of {} exceeded its deadline", this.location),
                )));
            }
        }

        this.inner.as_mut().poll_read(cx, buf)
    }
}

impl Drop for ReadStream {
    fn drop(&mut self) {
        tracing::debug!(
            backend = %self.backend,
            location = %self.location,
            "Read stream released"
        );
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("backend", &self.backend)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteClient;
    use crate::memory::MemoryConnector;
    use bytes::Bytes;
    use object_store::PutPayload;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    fn memory_reader() -> (InputReader, MemoryConnector, ClientHandle) {
        let connector = MemoryConnector::new();
        let handle = ClientHandle::ready(RemoteClient::new(Box::new(connector.clone())));
        (InputReader::new(handle.clone()), connector, handle)
    }

    #[tokio::test]
    async fn test_open_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "hello world").unwrap();

        let reader = InputReader::local_only();
        let mut stream = reader
            .open(&IoContext::background(), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(stream.backend(), StorageBackend::Local);

        let mut contents = String::new();
        stream.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello world");
        stream.close();
    }

    #[tokio::test]
    async fn test_open_local_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let err = InputReader::local_only()
            .open(&IoContext::background(), path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_open_local_directory_fails() {
        let dir = tempdir().unwrap();
        let err = InputReader::local_only()
            .open(&IoContext::background(), dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::OpenFailed { .. }));
    }

    #[tokio::test]
    async fn test_open_remote_object() {
        let (reader, connector, _handle) = memory_reader();
        connector
            .container("bucket")
            .put(
                &ObjectPath::from("dir/object.bin"),
                PutPayload::from(Bytes::from_static(b"remote bytes")),
            )
            .await
            .unwrap();

        let mut stream = reader
            .open(&IoContext::background(), "s3://bucket/dir/object.bin")
            .await
            .unwrap();
        assert_eq!(stream.backend(), StorageBackend::S3);
        assert_eq!(stream.location(), "s3://bucket/dir/object.bin");

        let mut contents = Vec::new();
        stream.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"remote bytes");
    }

    #[tokio::test]
    async fn test_open_remote_missing_object() {
        let (reader, _connector, _handle) = memory_reader();
        let err = reader
            .open(&IoContext::background(), "s3://bucket/nope")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_open_remote_requires_key_and_container() {
        let (reader, connector, _handle) = memory_reader();
        for location in ["s3://bucket", "s3://bucket/", "s3:///key"] {
            let err = reader
                .open(&IoContext::background(), location)
                .await
                .unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidReference { .. }),
                "{location}: {err}"
            );
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_open_remote_without_client() {
        let err = InputReader::local_only()
            .open(&IoContext::background(), "s3://bucket/key")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_open_remote_after_release() {
        let (reader, _connector, handle) = memory_reader();
        handle.release().await;
        let err = reader
            .open(&IoContext::background(), "s3://bucket/key")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_read_after_cancel_is_interrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "some data").unwrap();

        let ctx = IoContext::background();
        let mut stream = InputReader::local_only()
            .open(&ctx, path.to_str().unwrap())
            .await
            .unwrap();
        ctx.cancel();

        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
