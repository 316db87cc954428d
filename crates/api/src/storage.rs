// Path: crates/api/src/storage.rs

//! API for content-addressed blob storage backends.
//!
//! The backend set is open (filesystem today, S3/GCS adapters live outside
//! the kernel), so this seam uses dynamic dispatch: the content store holds
//! an `Arc<dyn ObjectStore>`.

use helm_types::error::CasError;

/// A blob store addressed by the 64-character lowercase hex digest of the
/// blob's contents. Hash computation and format validation happen above this
/// trait; backends only move bytes.
pub trait ObjectStore: Send + Sync {
    /// Writes a blob under its hex digest. MUST be idempotent: writing bytes
    /// that already exist is a success and leaves a single stored copy.
    /// Concurrent writers of identical bytes must both observe success.
    fn put(&self, hex_digest: &str, bytes: &[u8]) -> Result<(), CasError>;

    /// Reads the blob stored under `hex_digest`, or `CasError::NotFound`.
    fn get(&self, hex_digest: &str) -> Result<Vec<u8>, CasError>;

    /// Whether a blob exists under `hex_digest`.
    fn exists(&self, hex_digest: &str) -> Result<bool, CasError>;

    /// Removes the blob under `hex_digest`. Deleting an absent blob succeeds.
    fn delete(&self, hex_digest: &str) -> Result<(), CasError>;
}
