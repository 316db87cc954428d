// Path: crates/storage/src/cas.rs

use helm_api::storage::ObjectStore;
use helm_crypto::algorithms::hash::content_hash_bytes;
use helm_types::app::ContentHash;
use helm_types::error::CasError;
use std::sync::Arc;

/// The content-addressed store: computes hashes, validates hash structure,
/// and dispatches to a pluggable backend.
///
/// The store owns its backend handle; nothing else touches the backend
/// directly.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn ObjectStore>,
}

impl ContentStore {
    /// Fronts the given backend.
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self { backend }
    }

    /// Stores bytes under their content hash. Idempotent: storing the same
    /// bytes twice produces the same hash and leaves one stored blob.
    pub fn store(&self, bytes: &[u8]) -> Result<ContentHash, CasError> {
        let hash = content_hash_bytes(bytes);
        if !self.backend.exists(hash.hex())? {
            self.backend.put(hash.hex(), bytes)?;
        }
        Ok(hash)
    }

    /// Fetches the bytes stored under a hash. The hash is validated
    /// structurally before the backend is consulted.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>, CasError> {
        let hash = ContentHash::parse(hash)?;
        self.backend.get(hash.hex())
    }

    /// Whether a blob exists under a hash.
    pub fn exists(&self, hash: &str) -> Result<bool, CasError> {
        let hash = ContentHash::parse(hash)?;
        self.backend.exists(hash.hex())
    }

    /// Deletes the blob under a hash. Absent deletion succeeds.
    pub fn delete(&self, hash: &str) -> Result<(), CasError> {
        let hash = ContentHash::parse(hash)?;
        self.backend.delete(hash.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store() -> (ContentStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (ContentStore::new(backend.clone()), backend)
    }

    #[test]
    fn store_is_idempotent() {
        let (cas, backend) = store();
        let first = cas.store(b"same bytes").unwrap();
        let second = cas.store(b"same bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.len(), 1);
        assert_eq!(cas.get(first.as_str()).unwrap(), b"same bytes");
    }

    #[test]
    fn get_validates_hash_before_dispatch() {
        let (cas, _) = store();
        assert!(matches!(
            cas.get("sha256:nothex"),
            Err(CasError::InvalidHash(_))
        ));
        assert!(matches!(
            cas.get(&format!("sha512:{}", "ab".repeat(32))),
            Err(CasError::InvalidHash(_))
        ));
    }

    #[test]
    fn missing_blob_is_not_found() {
        let (cas, _) = store();
        let absent = format!("sha256:{}", "0f".repeat(32));
        assert!(matches!(cas.get(&absent), Err(CasError::NotFound(_))));
        assert!(!cas.exists(&absent).unwrap());
        cas.delete(&absent).unwrap();
    }

    #[test]
    fn concurrent_identical_writes_both_succeed() {
        let (cas, backend) = store();
        let cas2 = cas.clone();
        let a = std::thread::spawn(move || cas.store(b"contended").unwrap());
        let b = std::thread::spawn(move || cas2.store(b"contended").unwrap());
        let (ha, hb) = (a.join().unwrap(), b.join().unwrap());
        assert_eq!(ha, hb);
        assert_eq!(backend.len(), 1);
    }
}
