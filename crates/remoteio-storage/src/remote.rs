use crate::client::ClientHandle;
use crate::context::IoContext;
use crate::copy::{copy_chunked_with, WriteInterrupt, DEFAULT_CHUNK_SIZE};
use crate::traits::{StorageError, StorageResult};
use crate::uri::RemoteRef;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Content type applied when the caller passes an empty one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Default in-memory upload buffer; also the multipart part size (10 MiB)
pub const DEFAULT_UPLOAD_BUFFER: usize = 10 * 1024 * 1024;

/// Streams data into remote objects.
///
/// Data is buffered up to `upload_buffer` bytes; larger objects switch to a
/// multipart upload, so memory stays bounded. The object only becomes visible
/// when the upload is committed.
#[derive(Clone, Debug)]
pub struct RemoteWriter {
    pub(crate) client: ClientHandle,
    chunk_size: usize,
    upload_buffer: usize,
}

impl RemoteWriter {
    pub fn new(client: ClientHandle) -> Self {
        Self::with_sizes(client, DEFAULT_CHUNK_SIZE, DEFAULT_UPLOAD_BUFFER)
    }

    pub fn with_sizes(client: ClientHandle, chunk_size: usize, upload_buffer: usize) -> Self {
        RemoteWriter {
            client,
            chunk_size,
            upload_buffer,
        }
    }

    /// Stream `source` into `container`/`key`.
    ///
    /// Returns the number of bytes written. Fails with `WriteFailed` if the
    /// copy fails (the upload is aborted) and with `CommitFailed` if the
    /// final commit fails.
    ///
    /// Writes into the upload are never interrupted midway: the context is
    /// checked between chunks, so a multipart upload that is being created is
    /// always known to the sink when it is aborted. A commit interrupted by
    /// the context returns `Cancelled` or `DeadlineExceeded`; a multipart
    /// upload left open at that point is not aborted.
    pub async fn write_to_remote<R>(
        &self,
        ctx: &IoContext,
        container: &str,
        key: &str,
        source: &mut R,
        content_type: &str,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let target = RemoteRef {
            container: container.to_string(),
            key: key.to_string(),
        };
        let location = target.to_string();

        if container.is_empty() {
            return Err(StorageError::invalid_reference(&location, "container is empty"));
        }
        if key.is_empty() {
            return Err(StorageError::invalid_reference(&location, "object key is empty"));
        }

        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };

        let client = self.client.acquire("write", &location).await?;
        let start = std::time::Instant::now();

        tracing::info!(
            bucket = %container,
            key = %key,
            content_type = %content_type,
            "Remote write started"
        );

        let store = ctx
            .run("write", &location, async {
                client
                    .store(container)
                    .await
                    .map_err(|e| StorageError::WriteFailed {
                        location: location.clone(),
                        source: Box::new(e),
                    })
            })
            .await?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let mut sink = BufWriter::with_capacity(store, ObjectPath::from(key), self.upload_buffer)
            .with_attributes(attributes);

        let written = match copy_chunked_with(
            ctx,
            &location,
            source,
            &mut sink,
            self.chunk_size,
            WriteInterrupt::BetweenChunks,
        )
        .await
        {
            Ok(written) => written,
            Err(e) => {
                abort_sink(&mut sink, container, key).await;
                tracing::error!(
                    error = %e,
                    bucket = %container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote write failed"
                );
                return Err(e);
            }
        };

        let committed = ctx
            .run("commit", &location, async {
                sink.shutdown()
                    .await
                    .map_err(|e| StorageError::CommitFailed {
                        location: location.clone(),
                        source: Box::new(e),
                    })
            })
            .await;

        // Once shutdown has started the sink can no longer be aborted. A failed
        // multipart completion aborts its own upload.
        if let Err(e) = committed {
            tracing::error!(
                error = %e,
                bucket = %container,
                key = %key,
                size_bytes = written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Remote commit failed"
            );
            return Err(e);
        }

        tracing::info!(
            bucket = %container,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote write committed"
        );

        Ok(written)
    }

    /// Parse `location` and write to the object it names.
    pub async fn write_to_uri<R>(
        &self,
        ctx: &IoContext,
        location: &str,
        source: &mut R,
        content_type: &str,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let target = RemoteRef::parse_object(location)?;
        self.write_to_remote(ctx, &target.container, &target.key, source, content_type)
            .await
    }
}

async fn abort_sink(sink: &mut BufWriter, container: &str, key: &str) {
    if let Err(e) = sink.abort().await {
        tracing::warn!(
            error = %e,
            bucket = %container,
            key = %key,
            "Failed to abort remote upload"
        );
    }
}
