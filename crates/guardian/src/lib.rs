// Path: crates/guardian/src/lib.rs
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

//! # HELM Guardian
//!
//! The enforcement core: for every side-effect an agent attempts, decide
//! whether it is authorized under the active requirement graph, at the
//! current rate, within budget, and backed by the required evidence, then
//! emit a signed, audit-chained `DecisionRecord`, plus a short-lived
//! execution intent on PASS.
//!
//! Everything here is fail-closed: the seed verdict is FAIL and only a fully
//! satisfied pipeline upgrades it.

/// Atomic multi-resource budget tracking.
pub mod budget;
/// The guardian core: decision pipeline, intents, receipts.
pub mod core;
/// Policy decision point backends (native, OPA, Cedar).
pub mod pdp;
/// The proof requirement graph and its sandboxed expression evaluator.
pub mod prg;
/// Deterministic backoff and pre-committed retry plans.
pub mod retry;
/// Ed25519 signing of decisions, intents, and receipts over canonical bytes.
pub mod signer;
/// The temporal guardian: sliding-window rate tracking with graded response.
pub mod temporal;

pub use crate::core::{Guardian, GuardianBuilder};
pub use budget::BudgetTracker;
pub use prg::{PolicyEngine, graph_content_hash, requirement_set_hash};
pub use signer::RecordSigner;
pub use temporal::{ResponseLevel, TemporalGuardian, TemporalPolicy, ThresholdPolicy};
