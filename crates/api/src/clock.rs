// Path: crates/api/src/clock.rs

//! Injected authority time.
//!
//! The guardian and the temporal guardian never read wall-clock time
//! directly (kernel TCB rule): both take a `Clock` at construction. Tests
//! substitute a deterministic clock; production wires `SystemClock`.

use chrono::{DateTime, Utc};

/// A source of authority time.
pub trait Clock: Send + Sync {
    /// The current authority time.
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock. The only place in the kernel that touches the
/// operating system's clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
