//! remoteio storage library
//!
//! A uniform byte-stream abstraction over an S3-compatible object store
//! (addressed as `s3://container/key`) and the local filesystem (any other
//! string). The [`ClientFactory`] owns the one shared remote client and hands
//! out readers and writers bound to it; closing the factory releases the
//! client exactly once and makes every derived component fail with
//! [`StorageError::BackendUnavailable`].
//!
//! # Location format
//!
//! - `s3://bucket/path/to/object` - remote object
//! - `s3://bucket` - parses, but is not a valid read/write target
//! - anything else - local path, using the host's path rules

pub mod client;
pub mod context;
pub mod copy;
pub mod factory;
pub mod local;
pub mod memory;
pub mod reader;
pub mod remote;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod uri;
pub mod writer;

// Re-export commonly used types
pub use client::{ClientHandle, ClientState, RemoteClient};
pub use context::IoContext;
pub use copy::{copy_chunked, copy_chunked_with, WriteInterrupt};
pub use factory::ClientFactory;
pub use local::LocalWriter;
pub use memory::MemoryConnector;
pub use reader::{InputReader, ReadStream};
pub use remote::{RemoteWriter, DEFAULT_CONTENT_TYPE};
pub use remoteio_core::{RemoteIoConfig, StorageBackend};
#[cfg(feature = "storage-s3")]
pub use s3::S3Connector;
pub use traits::{StorageError, StorageResult, StoreConnector};
pub use uri::{is_remote, parse_remote, Location, RemoteRef, REMOTE_SCHEME};
pub use writer::OutputWriter;
