// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # HELM Kernel Types
//!
//! This crate is the foundational library for the HELM Kernel, containing all
//! core data structures, the canonical codec, and error types.
//!
//! ## Architectural Role
//!
//! As the base crate, `helm-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `ArtifactEnvelope`, `DecisionRecord`, `Obligation`,
//! and the various error enums.

/// The maximum size in bytes for an artifact payload accepted by the registry.
pub const MAX_ARTIFACT_PAYLOAD_BYTES: usize = 10 * 1024 * 1024; // 10 MiB
/// The absolute lifetime of an execution intent, in seconds. No renewal.
pub const INTENT_TTL_SECS: i64 = 300;
/// The genesis link of the obligation ledger hash chain: 64 zero hex chars.
pub const LEDGER_GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Core application-level data structures like envelopes, decisions, and obligations.
pub mod app;
/// The canonical, deterministic JSON codec (JCS + CSNF) for all signed or hashed payloads.
pub mod codec;
/// Kernel configuration resolved from the environment.
pub mod config;
/// A unified set of all error types used across the kernel, plus the ErrorIR taxonomy.
pub mod error;
/// A prelude containing useful extension traits like `OptionExt`.
pub mod prelude;
