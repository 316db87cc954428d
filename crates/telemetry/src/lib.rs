// Path: crates/telemetry/src/lib.rs
//! Structured logging for the HELM Kernel.

pub mod init;

pub use init::init_tracing;
