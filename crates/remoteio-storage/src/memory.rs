//! In-process remote backend.
//!
//! Containers are `object_store::memory::InMemory` stores created on first
//! use. Clones share the same containers, so data written through one factory
//! is visible to another built from a clone of the same connector.

use crate::traits::StoreConnector;
use async_trait::async_trait;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    containers: Mutex<HashMap<String, Arc<InMemory>>>,
    connects: AtomicUsize,
    releases: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access to a container's store, bypassing any client.
    pub fn container(&self, name: &str) -> Arc<InMemory> {
        let mut containers = self
            .inner
            .containers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        containers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }

    /// Number of `connect` calls served.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of `release` calls received.
    pub fn release_count(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, container: &str) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        let store: Arc<dyn ObjectStore> = self.container(container);
        Ok(store)
    }

    async fn release(&self) {
        self.inner.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
