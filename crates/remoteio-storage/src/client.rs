//! The shared remote client and its lifecycle cell.
//!
//! [`RemoteClient`] is expensive to build and safe to share. It is never
//! handed out directly: readers and writers hold a [`ClientHandle`], which
//! checks the lifecycle state on every access and yields a short-lived
//! `Arc<RemoteClient>` only while the client is `Ready`.

use crate::traits::{StorageError, StorageResult, StoreConnector};
use object_store::ObjectStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Remote backend session: a connector plus one cached store per container.
pub struct RemoteClient {
    connector: Box<dyn StoreConnector>,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl RemoteClient {
    pub fn new(connector: Box<dyn StoreConnector>) -> Self {
        RemoteClient {
            connector,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Get the store for `container`, connecting on first use.
    pub async fn store(&self, container: &str) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
        if let Some(store) = self.stores.read().await.get(container) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(container) {
            return Ok(store.clone());
        }

        let store = self.connector.connect(container).await?;
        stores.insert(container.to_string(), store.clone());
        tracing::debug!(
            backend = self.connector.name(),
            bucket = %container,
            "Remote store connected"
        );
        Ok(store)
    }

    async fn release(&self) {
        let dropped = {
            let mut stores = self.stores.write().await;
            let count = stores.len();
            stores.clear();
            count
        };
        self.connector.release().await;
        tracing::debug!(
            backend = self.connector.name(),
            stores = dropped,
            "Remote client released"
        );
    }
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("backend", &self.connector.name())
            .finish_non_exhaustive()
    }
}

/// Lifecycle of the shared client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Ready,
    Closed,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Uninitialized => "uninitialized",
            ClientState::Ready => "ready",
            ClientState::Closed => "closed",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Slot {
    Uninitialized,
    Ready(Arc<RemoteClient>),
    Closed,
}

impl Slot {
    fn state(&self) -> ClientState {
        match self {
            Slot::Uninitialized => ClientState::Uninitialized,
            Slot::Ready(_) => ClientState::Ready,
            Slot::Closed => ClientState::Closed,
        }
    }
}

/// Cloneable reference to the shared client cell.
///
/// Every clone observes the same state; the `Ready -> Closed` transition
/// happens once, under the write lock.
#[derive(Clone)]
pub struct ClientHandle {
    slot: Arc<RwLock<Slot>>,
}

impl ClientHandle {
    pub fn ready(client: RemoteClient) -> Self {
        ClientHandle {
            slot: Arc::new(RwLock::new(Slot::Ready(Arc::new(client)))),
        }
    }

    /// A handle with no client, for local-only use.
    pub fn uninitialized() -> Self {
        ClientHandle {
            slot: Arc::new(RwLock::new(Slot::Uninitialized)),
        }
    }

    pub async fn state(&self) -> ClientState {
        self.slot.read().await.state()
    }

    /// Borrow the client for one operation.
    pub async fn acquire(
        &self,
        operation: &'static str,
        location: &str,
    ) -> StorageResult<Arc<RemoteClient>> {
        match &*self.slot.read().await {
            Slot::Ready(client) => Ok(client.clone()),
            other => Err(StorageError::BackendUnavailable {
                operation,
                location: location.to_string(),
                state: other.state().as_str(),
            }),
        }
    }

    /// Move to `Closed` and release the client.
    ///
    /// Returns `true` only for the call that performed the release. Later
    /// (or concurrent losing) calls return `false` and do nothing.
    pub async fn release(&self) -> bool {
        let client = {
            let mut slot = self.slot.write().await;
            match std::mem::replace(&mut *slot, Slot::Closed) {
                Slot::Ready(client) => client,
                Slot::Uninitialized | Slot::Closed => return false,
            }
        };

        client.release().await;
        true
    }

    /// True when both handles refer to the same cell.
    pub fn shares_cell_with(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle").finish_non_exhaustive()
    }
}
