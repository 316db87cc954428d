// Path: crates/storage/src/lib.rs
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

//! # HELM Kernel Storage
//!
//! Content-addressed blob storage (memory and filesystem backends), the
//! `ContentStore` that fronts them, and the artifact registry that validates
//! and verifies evidence envelopes. S3/GCS adapters implement the same
//! `ObjectStore` trait outside the kernel.

mod cas;
mod fs;
mod memory;
mod registry;

pub use cas::ContentStore;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use registry::ArtifactRegistry;
