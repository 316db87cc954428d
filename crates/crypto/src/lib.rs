// Path: crates/crypto/src/lib.rs
//! # HELM Kernel Crypto Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free code. Panics are disallowed in non-test code to promote
//! robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
//! # HELM Kernel Cryptography
//!
//! SHA-256 content hashing, the shared hash-chain link routine, Ed25519
//! signing, and the evidence Merkle tree.

pub mod algorithms;
pub mod error;
pub mod merkle;
pub mod sign;
