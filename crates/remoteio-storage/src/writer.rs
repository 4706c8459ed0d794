//! Destination-bound writer variant.

use crate::context::IoContext;
use crate::local::LocalWriter;
use crate::remote::RemoteWriter;
use crate::traits::StorageResult;
use crate::uri::RemoteRef;
use remoteio_core::StorageBackend;
use std::path::PathBuf;
use tokio::io::AsyncRead;

/// A writer already matched to a classified destination.
///
/// Built by [`crate::ClientFactory::new_output_writer`], so the facet can
/// never disagree with the destination.
#[derive(Debug)]
pub enum OutputWriter {
    Remote {
        writer: RemoteWriter,
        target: RemoteRef,
    },
    Local {
        writer: LocalWriter,
        path: PathBuf,
    },
}

impl OutputWriter {
    pub fn backend(&self) -> StorageBackend {
        match self {
            OutputWriter::Remote { .. } => StorageBackend::S3,
            OutputWriter::Local { .. } => StorageBackend::Local,
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            OutputWriter::Remote { target, .. } => target.to_string(),
            OutputWriter::Local { path, .. } => path.display().to_string(),
        }
    }

    /// Stream `source` to the destination. `content_type` only applies to remote targets.
    pub async fn write<R>(
        &self,
        ctx: &IoContext,
        source: &mut R,
        content_type: &str,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match self {
            OutputWriter::Remote { writer, target } => {
                writer
                    .write_to_remote(ctx, &target.container, &target.key, source, content_type)
                    .await
            }
            OutputWriter::Local { writer, path } => writer.write_to_local(ctx, path, source).await,
        }
    }
}
