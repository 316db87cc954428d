// Path: crates/crypto/src/algorithms/hash.rs
//! SHA-256 content hashing and the shared hash-chain link routine.

use helm_types::app::ContentHash;
use helm_types::codec;
use helm_types::error::CanonError;
use sha2::{Digest, Sha256};

/// Hashes a message with SHA-256.
pub fn sha256(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize().into()
}

/// Hashes a message with SHA-256 and returns lowercase hex.
pub fn sha256_hex(message: &[u8]) -> String {
    hex::encode(sha256(message))
}

/// Computes the content hash of canonical bytes: `"sha256:" + hex`.
pub fn content_hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::from_digest(sha256(bytes))
}

/// Canonicalizes a JSON value and computes its content hash.
pub fn content_hash_value(value: &serde_json::Value) -> Result<ContentHash, CanonError> {
    Ok(content_hash_bytes(&codec::jcs(value)?))
}

/// Canonicalizes a typed record and computes its content hash.
pub fn content_hash_record<T: serde::Serialize>(value: &T) -> Result<ContentHash, CanonError> {
    Ok(content_hash_bytes(&codec::canonical_bytes(value)?))
}

/// Hashes domain-separated material: `SHA256(tag ‖ 0x00 ‖ part ‖ 0x00 ‖ …)`.
///
/// The NUL separator between parts prevents ambiguous concatenations; the tag
/// prevents cross-protocol second preimages.
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// The shared chain-link routine behind the audit log, the obligation ledger,
/// and the kernel event log: hashes the previous link followed by each piece
/// of entry material, returning the new link as lowercase hex.
///
/// Callers whose entry material already embeds the previous link (the audit
/// log hashes the full canonical entry, `previous_hash` included) pass `""`.
pub fn append_linked(previous_hash: &str, material: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    for part in material {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
