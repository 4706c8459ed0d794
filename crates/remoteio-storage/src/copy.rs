//! Bounded streaming copy.

use crate::context::IoContext;
use crate::traits::{StorageError, StorageResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default copy chunk size (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// How a copy observes its context while writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteInterrupt {
    /// Race every write against the context.
    Race,
    /// Let each write run to completion and check the context between chunks.
    /// For sinks whose writes start server-side work they must track.
    BetweenChunks,
}

/// Copy `reader` into `writer` through one fixed `chunk_size` buffer.
///
/// Memory use is independent of the amount of data. Each read and write is
/// raced against `ctx`; I/O failures on either side become `WriteFailed` for
/// `location`. The writer is neither flushed nor shut down here, since
/// finalization belongs to the caller.
pub async fn copy_chunked<R, W>(
    ctx: &IoContext,
    location: &str,
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> StorageResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_chunked_with(ctx, location, reader, writer, chunk_size, WriteInterrupt::Race).await
}

/// [`copy_chunked`] with an explicit write interruption mode. Reads are always raced.
pub async fn copy_chunked_with<R, W>(
    ctx: &IoContext,
    location: &str,
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    interrupt: WriteInterrupt,
) -> StorageResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;

    loop {
        let read = ctx
            .run("copy", location, async {
                reader
                    .read(&mut buf)
                    .await
                    .map_err(|e| write_failed(location, e))
            })
            .await?;

        if read == 0 {
            break;
        }

        let write = async {
            writer
                .write_all(&buf[..read])
                .await
                .map_err(|e| write_failed(location, e))
        };
        match interrupt {
            WriteInterrupt::Race => ctx.run("copy", location, write).await?,
            WriteInterrupt::BetweenChunks => {
                ctx.check("copy", location)?;
                write.await?
            }
        }

        total += read as u64;
    }

    Ok(total)
}

fn write_failed(location: &str, err: std::io::Error) -> StorageError {
    StorageError::WriteFailed {
        location: location.to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use tokio_util::sync::CancellationToken;

    /// Produces `len` bytes of a repeating pattern without materializing them,
    /// optionally failing once `fail_after` bytes have been delivered.
    pub struct LazySource {
        len: u64,
        produced: u64,
        fail_after: Option<u64>,
        cancel_after: Option<(u64, CancellationToken)>,
    }

    impl LazySource {
        pub fn new(len: u64) -> Self {
            LazySource {
                len,
                produced: 0,
                fail_after: None,
                cancel_after: None,
            }
        }

        pub fn failing_after(len: u64, fail_after: u64) -> Self {
            LazySource {
                len,
                produced: 0,
                fail_after: Some(fail_after),
                cancel_after: None,
            }
        }

        /// Cancels `token` once `after` bytes have been delivered, then keeps producing.
        pub fn cancelling_after(len: u64, after: u64, token: CancellationToken) -> Self {
            LazySource {
                len,
                produced: 0,
                fail_after: None,
                cancel_after: Some((after, token)),
            }
        }

        pub fn byte_at(offset: u64) -> u8 {
            (offset % 251) as u8
        }
    }

    impl AsyncRead for LazySource {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(limit) = self.fail_after {
                if self.produced >= limit {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "source went away",
                    )));
                }
            }

            let mut end = self.len;
            if let Some(limit) = self.fail_after {
                end = end.min(limit);
            }
            let remaining = end - self.produced;
            let n = remaining.min(buf.remaining() as u64) as usize;
            let start = self.produced;
            let dst = buf.initialize_unfilled_to(n);
            for (i, b) in dst.iter_mut().enumerate() {
                *b = Self::byte_at(start + i as u64);
            }
            buf.advance(n);
            self.produced += n as u64;
            if let Some((after, token)) = &self.cancel_after {
                if self.produced >= *after {
                    token.cancel();
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    /// Sink that verifies the pattern, counts bytes and records the largest write.
    #[derive(Default)]
    pub struct CheckingSink {
        pub written: u64,
        pub largest_write: usize,
        pub mismatch: bool,
    }

    impl AsyncWrite for CheckingSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let start = self.written;
            if buf
                .iter()
                .enumerate()
                .any(|(i, b)| *b != LazySource::byte_at(start + i as u64))
            {
                self.mismatch = true;
            }
            self.written += buf.len() as u64;
            self.largest_write = self.largest_write.max(buf.len());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}
