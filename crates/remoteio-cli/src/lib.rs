//! Transfer glue for the `remoteio` binary.
//!
//! The factory is always passed in explicitly; this module never constructs
//! or closes it.

use anyhow::Context;
use remoteio_storage::copy::DEFAULT_CHUNK_SIZE;
use remoteio_storage::{copy_chunked, ClientFactory, IoContext, StorageBackend};
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Where a transfer ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Backend(StorageBackend),
    Stdout,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Backend(backend) => write!(f, "{}", backend),
            OutputKind::Stdout => write!(f, "stdout"),
        }
    }
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes: u64,
    pub output: OutputKind,
}

/// Copy `source` to `output`, or to `stdout` when no output is given.
///
/// The input stream is released on every path before this returns.
pub async fn run_transfer<W>(
    factory: &ClientFactory,
    ctx: &IoContext,
    source: &str,
    output: Option<&str>,
    content_type: &str,
    stdout: &mut W,
) -> anyhow::Result<TransferReport>
where
    W: AsyncWrite + Unpin,
{
    let reader = factory
        .new_input_reader()
        .await
        .context("Failed to create input reader")?;

    let mut stream = reader
        .open(ctx, source)
        .await
        .with_context(|| format!("Failed to open input stream ({})", source))?;

    let report = match output {
        Some(destination) => {
            let writer = factory
                .new_output_writer(destination)
                .await
                .with_context(|| format!("Failed to create output writer for {}", destination))?;

            tracing::info!(
                input = %source,
                output = %writer.display_name(),
                backend = %writer.backend(),
                remote = writer.backend().is_remote(),
                "Transfer started"
            );

            let bytes = writer
                .write(ctx, &mut stream, content_type)
                .await
                .with_context(|| format!("Failed to write {}", destination))?;

            TransferReport {
                bytes,
                output: OutputKind::Backend(writer.backend()),
            }
        }
        None => {
            tracing::info!(input = %source, output = "stdout", "Transfer started");

            let bytes = copy_chunked(ctx, "stdout", &mut stream, stdout, DEFAULT_CHUNK_SIZE)
                .await
                .context("Failed to copy data to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;

            TransferReport {
                bytes,
                output: OutputKind::Stdout,
            }
        }
    };

    stream.close();

    tracing::info!(
        input = %source,
        size_bytes = report.bytes,
        output = %report.output,
        "Transfer completed"
    );

    Ok(report)
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use remoteio_storage::{MemoryConnector, RemoteIoConfig, StorageError};
    use tempfile::tempdir;

    fn memory_factory() -> ClientFactory {
        ClientFactory::with_connector(
            Box::new(MemoryConnector::new()),
            &RemoteIoConfig::default(),
        )
    }

    #[tokio::test]
    async fn transfer_local_to_stdout() {
        let factory = memory_factory();
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "to the terminal").unwrap();

        let mut out: Vec<u8> = Vec::new();
        let report = run_transfer(
            &factory,
            &IoContext::background(),
            path.to_str().unwrap(),
            None,
            "",
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(report.output, OutputKind::Stdout);
        assert_eq!(report.bytes, 15);
        assert_eq!(out, b"to the terminal");
    }

    #[tokio::test]
    async fn transfer_local_to_remote_and_back() {
        let factory = memory_factory();
        let ctx = IoContext::background();
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out/copy.txt");
        std::fs::write(&input, "there and back").unwrap();
        let mut out: Vec<u8> = Vec::new();

        let up = run_transfer(
            &factory,
            &ctx,
            input.to_str().unwrap(),
            Some("s3://bucket/copy.txt"),
            "",
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(up.output, OutputKind::Backend(StorageBackend::S3));

        let down = run_transfer(
            &factory,
            &ctx,
            "s3://bucket/copy.txt",
            Some(output.to_str().unwrap()),
            "",
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(down.output, OutputKind::Backend(StorageBackend::Local));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "there and back");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn transfer_after_close_reports_factory_closed() {
        let factory = memory_factory();
        factory.close().await.unwrap();

        let mut out: Vec<u8> = Vec::new();
        let err = run_transfer(
            &factory,
            &IoContext::background(),
            "s3://bucket/key",
            None,
            "",
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::FactoryClosed { .. })
        ));
    }

    #[tokio::test]
    async fn transfer_to_container_only_uri_fails() {
        let factory = memory_factory();
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "x").unwrap();

        let mut out: Vec<u8> = Vec::new();
        let err = run_transfer(
            &factory,
            &IoContext::background(),
            input.to_str().unwrap(),
            Some("s3://bucket"),
            "",
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::InvalidReference { .. })
        ));
    }
}
