// Path: crates/ledger/src/lib.rs
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

//! # HELM Kernel Ledger
//!
//! Durable state for in-flight work: the hash-chained audit log, the
//! obligation ledger (with idempotent create, compare-and-update leases, and
//! skip-locked dispatch), and the kernel event log. All three chain their
//! rows through the same `append_linked` routine in `helm-crypto`.

mod audit;
mod events;
mod memory;
mod obligation;
mod redb_store;

pub use audit::{AuditLog, AuditStore, FileAuditStore, MemoryAuditStore};
pub use events::EventLog;
pub use memory::MemoryLedger;
pub use obligation::{obligation_link, verify_obligation_chain};
pub use redb_store::RedbLedger;
