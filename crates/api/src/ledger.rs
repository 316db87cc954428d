// Path: crates/api/src/ledger.rs

//! API for the durable obligation ledger.

use chrono::{DateTime, Duration, Utc};
use helm_types::app::{NewObligation, Obligation, ObligationState};
use helm_types::error::LedgerError;

/// The tenant a ledger call executes under. Every operation is scoped to
/// exactly one tenant; backends must filter rows accordingly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantContext {
    /// The active tenant id.
    pub tenant_id: String,
}

impl TenantContext {
    /// Builds a context for the given tenant. An empty id is rejected at the
    /// call site as `LedgerError::MissingTenant`.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

/// A durable store of obligations with idempotent creation, compare-and-update
/// leases, and skip-locked dispatch.
///
/// Backends are synchronous: calls run on worker-owned contexts and the
/// embedded engines (memory, redb) do not suspend. An external Postgres
/// adapter would implement the same trait over its own pool.
pub trait LedgerStore: Send + Sync {
    /// Creates an obligation, idempotently under `new.idempotency_key`.
    /// A second create with the same key returns the original row.
    fn create(
        &self,
        tenant: &TenantContext,
        new: NewObligation,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError>;

    /// Fetches one obligation by id within the tenant.
    fn get(&self, tenant: &TenantContext, id: &str) -> Result<Obligation, LedgerError>;

    /// Transitions an obligation's lifecycle state, stamping `updated_at`.
    /// An `error` is appended to the row's error log and bumps `retry_count`.
    fn update_state(
        &self,
        tenant: &TenantContext,
        id: &str,
        next: ObligationState,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError>;

    /// Atomically acquires or renews a lease: succeeds iff the row is
    /// unleased, the lease has expired, or `worker` already holds it.
    /// Otherwise returns `LedgerError::LockedByAnotherWorker`.
    fn acquire_lease(
        &self,
        tenant: &TenantContext,
        id: &str,
        worker: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError>;

    /// Dispatches the oldest `PENDING` obligation to `worker` without
    /// head-of-line blocking: rows currently claimed by other workers are
    /// skipped, concurrent callers receive disjoint rows. Returns
    /// `LedgerError::NoPendingObligations` when nothing is available.
    fn acquire_next_pending(
        &self,
        tenant: &TenantContext,
        worker: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError>;

    /// Lists `PENDING` obligations in creation order.
    fn list_pending(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError>;

    /// Lists every obligation in creation order.
    fn list_all(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError>;
}
