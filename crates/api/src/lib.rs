// Path: crates/api/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # HELM Kernel API
//!
//! Capability traits at the kernel's seams. Components never hold concrete
//! collaborators: the guardian takes a `Clock` and a `PolicyDecisionPoint`,
//! the content store takes an `ObjectStore`, the registry takes an
//! `ArtifactVerifier`, and so on. Constructors inject everything; there is
//! no ambient state.

/// Injected authority time.
pub mod clock;
/// Unified traits for cryptographic primitives.
pub mod crypto;
/// The durable obligation ledger interface.
pub mod ledger;
/// The policy decision point interface and its wire types.
pub mod pdp;
/// The content-addressed object store interface.
pub mod storage;
