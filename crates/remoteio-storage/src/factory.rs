use crate::client::{ClientHandle, ClientState, RemoteClient};
use crate::context::IoContext;
use crate::local::LocalWriter;
use crate::reader::InputReader;
use crate::remote::RemoteWriter;
#[cfg(feature = "storage-s3")]
use crate::s3::S3Connector;
use crate::traits::{StorageError, StorageResult, StoreConnector};
use crate::uri::{Location, RemoteRef};
use crate::writer::OutputWriter;
use remoteio_core::RemoteIoConfig;

/// Owns the remote client and builds every reader and writer bound to it.
///
/// Construct one per process, pass it by reference to whatever performs
/// transfers, and call [`ClientFactory::close`] once all of them are done.
/// Readers and writers are cheap; they all share the same client.
#[derive(Debug)]
pub struct ClientFactory {
    client: ClientHandle,
    backend: &'static str,
    chunk_size: usize,
    upload_buffer: usize,
}

impl ClientFactory {
    /// Create a factory backed by S3, using ambient credentials.
    #[cfg(feature = "storage-s3")]
    pub async fn new(ctx: &IoContext, config: &RemoteIoConfig) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::InitializationFailed {
                message: e.to_string(),
                source: None,
            })?;

        let connector = ctx
            .run("initialize", "s3", async { S3Connector::new(config) })
            .await
            .map_err(|e| {
                if e.is_interrupted() {
                    StorageError::InitializationFailed {
                        message: "S3 client initialization interrupted".to_string(),
                        source: Some(Box::new(e)),
                    }
                } else {
                    e
                }
            })?;

        Ok(Self::with_connector(Box::new(connector), config))
    }

    /// Create a factory around an arbitrary connector.
    pub fn with_connector(connector: Box<dyn StoreConnector>, config: &RemoteIoConfig) -> Self {
        let backend = connector.name();
        tracing::info!(backend, "Client factory ready");

        ClientFactory {
            client: ClientHandle::ready(RemoteClient::new(connector)),
            backend,
            chunk_size: config.chunk_size_bytes,
            upload_buffer: config.upload_buffer_bytes,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    pub async fn state(&self) -> ClientState {
        self.client.state().await
    }

    pub async fn is_closed(&self) -> bool {
        self.state().await == ClientState::Closed
    }

    async fn ensure_ready(&self, operation: &'static str) -> StorageResult<()> {
        match self.client.state().await {
            ClientState::Ready => Ok(()),
            ClientState::Uninitialized | ClientState::Closed => {
                Err(StorageError::FactoryClosed { operation })
            }
        }
    }

    pub async fn new_input_reader(&self) -> StorageResult<InputReader> {
        self.ensure_ready("create input reader").await?;
        Ok(InputReader::new(self.client.clone()))
    }

    pub async fn new_remote_writer(&self) -> StorageResult<RemoteWriter> {
        self.ensure_ready("create remote writer").await?;
        Ok(RemoteWriter::with_sizes(
            self.client.clone(),
            self.chunk_size,
            self.upload_buffer,
        ))
    }

    pub async fn new_local_writer(&self) -> StorageResult<LocalWriter> {
        self.ensure_ready("create local writer").await?;
        Ok(LocalWriter::new(self.chunk_size))
    }

    /// Classify `destination` and return the matching writer.
    ///
    /// Remote destinations must name an object; `s3://bucket` is rejected here.
    pub async fn new_output_writer(&self, destination: &str) -> StorageResult<OutputWriter> {
        self.ensure_ready("create output writer").await?;

        match Location::classify(destination) {
            Location::Remote(uri) => {
                let target = RemoteRef::parse_object(&uri)?;
                Ok(OutputWriter::Remote {
                    writer: self.new_remote_writer().await?,
                    target,
                })
            }
            Location::Local(path) => Ok(OutputWriter::Local {
                writer: self.new_local_writer().await?,
                path,
            }),
        }
    }

    /// Release the remote client. Safe to call any number of times, concurrently.
    pub async fn close(&self) -> StorageResult<()> {
        if self.client.release().await {
            tracing::info!(backend = self.backend, "Client factory closed");
        } else {
            tracing::debug!(backend = self.backend, "Client factory already closed");
        }
        Ok(())
    }
}
