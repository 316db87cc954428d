// Path: crates/crypto/src/error.rs
//! Local error types for the `helm-crypto` crate.

// Re-export the canonical error types from the base types crate.
pub use helm_types::error::{CryptoError, ProofError};
