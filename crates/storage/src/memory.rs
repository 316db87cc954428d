// Path: crates/storage/src/memory.rs

use helm_api::storage::ObjectStore;
use helm_types::error::CasError;
use std::collections::HashMap;
use std::sync::RwLock;

/// An in-memory blob store. The reference backend for tests and for
/// embedded/shadow deployments.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, hex_digest: &str, bytes: &[u8]) -> Result<(), CasError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CasError::Backend("poisoned lock".to_string()))?;
        // Idempotent: the same digest maps to the same bytes by construction.
        blobs
            .entry(hex_digest.to_string())
            .or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn get(&self, hex_digest: &str) -> Result<Vec<u8>, CasError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| CasError::Backend("poisoned lock".to_string()))?;
        blobs
            .get(hex_digest)
            .cloned()
            .ok_or_else(|| CasError::NotFound(hex_digest.to_string()))
    }

    fn exists(&self, hex_digest: &str) -> Result<bool, CasError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| CasError::Backend("poisoned lock".to_string()))?;
        Ok(blobs.contains_key(hex_digest))
    }

    fn delete(&self, hex_digest: &str) -> Result<(), CasError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CasError::Backend("poisoned lock".to_string()))?;
        blobs.remove(hex_digest);
        Ok(())
    }
}
