//! remoteio core library
//!
//! Configuration and backend identifiers shared by the storage and CLI crates.

pub mod config;
pub mod storage_types;

pub use config::RemoteIoConfig;
pub use storage_types::StorageBackend;
