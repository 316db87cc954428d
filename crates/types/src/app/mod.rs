// Path: crates/types/src/app/mod.rs
//! Core application-level data structures for the enforcement kernel.

/// Budget records and resource types.
pub mod budget;
/// Decision records, execution intents, and receipts.
pub mod decision;
/// Artifact envelopes and content hashes.
pub mod envelope;
/// Audit entries and kernel event envelopes.
pub mod events;
/// Durable obligations and their lifecycle.
pub mod obligation;
/// Proof requirement graph node types.
pub mod requirement;

pub use budget::*;
pub use decision::*;
pub use envelope::*;
pub use events::*;
pub use obligation::*;
pub use requirement::*;
