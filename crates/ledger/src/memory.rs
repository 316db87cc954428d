// Path: crates/ledger/src/memory.rs

use crate::obligation::{lease_available, obligation_link, require_tenant};
use chrono::{DateTime, Duration, Utc};
use helm_api::ledger::{LedgerStore, TenantContext};
use helm_types::app::{NewObligation, Obligation, ObligationState};
use helm_types::error::LedgerError;
use helm_types::LEDGER_GENESIS_HASH;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryInner {
    // id → row
    rows: HashMap<String, Obligation>,
    // (tenant, idempotency_key) → id
    by_key: HashMap<(String, String), String>,
    // insertion order of ids, oldest first
    order: Vec<String>,
    // tenant → chain tail
    tails: HashMap<String, String>,
}

/// The in-memory reference ledger. The full concurrency semantics
/// (idempotent create, lease compare-and-update, skip-locked dispatch,
/// tenant filtering) sit behind one mutex, so every operation is atomic.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<MemoryInner>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Backend("poisoned lock".to_string()))
    }
}

impl LedgerStore for MemoryLedger {
    fn create(
        &self,
        tenant: &TenantContext,
        new: NewObligation,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let mut inner = self.lock()?;

        let key = (tenant.tenant_id.clone(), new.idempotency_key.clone());
        if let Some(existing_id) = inner.by_key.get(&key) {
            let existing_id = existing_id.clone();
            return inner
                .rows
                .get(&existing_id)
                .cloned()
                .ok_or_else(|| LedgerError::Backend("index desync".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let previous_hash = inner
            .tails
            .get(&tenant.tenant_id)
            .cloned()
            .unwrap_or_else(|| LEDGER_GENESIS_HASH.to_string());
        let hash = obligation_link(&previous_hash, &id, &new.intent, now);

        let row = Obligation {
            id: id.clone(),
            idempotency_key: new.idempotency_key,
            intent: new.intent,
            state: ObligationState::Pending,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            error_log: vec![],
            leased_by: None,
            leased_until: None,
            hash: hash.clone(),
            previous_hash,
            metadata: new.metadata,
            tenant_id: tenant.tenant_id.clone(),
        };

        inner.by_key.insert(key, id.clone());
        inner.order.push(id.clone());
        inner.tails.insert(tenant.tenant_id.clone(), hash);
        inner.rows.insert(id, row.clone());
        Ok(row)
    }

    fn get(&self, tenant: &TenantContext, id: &str) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let inner = self.lock()?;
        inner
            .rows
            .get(id)
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn update_state(
        &self,
        tenant: &TenantContext,
        id: &str,
        next: ObligationState,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let mut inner = self.lock()?;
        let row = inner
            .rows
            .get_mut(id)
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if !row.state.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                from: row.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        row.state = next;
        row.updated_at = now;
        if let Some(error) = error {
            row.error_log.push(error);
            row.retry_count += 1;
        }
        Ok(row.clone())
    }

    fn acquire_lease(
        &self,
        tenant: &TenantContext,
        id: &str,
        worker: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let mut inner = self.lock()?;
        let row = inner
            .rows
            .get_mut(id)
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if !lease_available(row, worker, now) {
            // Zero rows matched the compare-and-update.
            return Err(LedgerError::LockedByAnotherWorker);
        }
        row.leased_by = Some(worker.to_string());
        row.leased_until = Some(now + duration);
        row.updated_at = now;
        Ok(row.clone())
    }

    fn acquire_next_pending(
        &self,
        tenant: &TenantContext,
        worker: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let mut inner = self.lock()?;

        // Oldest PENDING row whose lease is takeable; rows claimed by other
        // workers are skipped rather than waited on.
        let candidate = inner
            .order
            .iter()
            .filter_map(|id| inner.rows.get(id))
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .filter(|row| row.state == ObligationState::Pending)
            .find(|row| lease_available(row, worker, now))
            .map(|row| row.id.clone());

        let Some(id) = candidate else {
            return Err(LedgerError::NoPendingObligations);
        };
        let row = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| LedgerError::Backend("index desync".to_string()))?;
        row.leased_by = Some(worker.to_string());
        row.leased_until = Some(now + duration);
        row.updated_at = now;
        Ok(row.clone())
    }

    fn list_pending(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError> {
        require_tenant(tenant)?;
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.rows.get(id))
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .filter(|row| row.state == ObligationState::Pending)
            .cloned()
            .collect())
    }

    fn list_all(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError> {
        require_tenant(tenant)?;
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.rows.get(id))
            .filter(|row| row.tenant_id == tenant.tenant_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    fn tenant() -> TenantContext {
        TenantContext::new("tenant-a")
    }

    fn new_ob(key: &str) -> NewObligation {
        NewObligation {
            idempotency_key: key.to_string(),
            intent: format!("intent for {key}"),
            metadata: None,
        }
    }

    #[test]
    fn create_is_idempotent_under_key() {
        let ledger = MemoryLedger::new();
        let first = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        let second = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(ledger.list_all(&tenant()).unwrap().len(), 1);
    }

    #[test]
    fn chain_links_rows_with_zero_genesis() {
        let ledger = MemoryLedger::new();
        let a = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        let b = ledger.create(&tenant(), new_ob("k2"), t0()).unwrap();
        assert_eq!(a.previous_hash, LEDGER_GENESIS_HASH);
        assert_eq!(b.previous_hash, a.hash);
        assert_eq!(a.hash, obligation_link(LEDGER_GENESIS_HASH, &a.id, &a.intent, t0()));
    }

    #[test]
    fn lease_is_exclusive_until_expiry() {
        let ledger = MemoryLedger::new();
        let row = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        ledger
            .acquire_lease(&tenant(), &row.id, "w1", Duration::seconds(60), t0())
            .unwrap();
        // Another worker is refused while the lease holds.
        assert!(matches!(
            ledger.acquire_lease(&tenant(), &row.id, "w2", Duration::seconds(60), t0()),
            Err(LedgerError::LockedByAnotherWorker)
        ));
        // The holder may renew.
        ledger
            .acquire_lease(&tenant(), &row.id, "w1", Duration::seconds(60), t0())
            .unwrap();
        // After expiry another worker may take it.
        let later = t0() + Duration::seconds(61);
        ledger
            .acquire_lease(&tenant(), &row.id, "w2", Duration::seconds(60), later)
            .unwrap();
    }

    #[test]
    fn concurrent_dispatch_yields_one_winner() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        let a = {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger.acquire_next_pending(&tenant(), "w1", Duration::seconds(60), t0())
            })
        };
        let b = {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger.acquire_next_pending(&tenant(), "w2", Duration::seconds(60), t0())
            })
        };
        let results = [a.join().unwrap(), b.join().unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let empty = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::NoPendingObligations)))
            .count();
        assert_eq!((wins, empty), (1, 1));
    }

    #[test]
    fn dispatch_skips_claimed_rows() {
        let ledger = MemoryLedger::new();
        let first = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        let second = ledger.create(&tenant(), new_ob("k2"), t0()).unwrap();

        let got1 = ledger
            .acquire_next_pending(&tenant(), "w1", Duration::seconds(60), t0())
            .unwrap();
        assert_eq!(got1.id, first.id);
        // w2 is not blocked behind w1's claim; it gets the next row.
        let got2 = ledger
            .acquire_next_pending(&tenant(), "w2", Duration::seconds(60), t0())
            .unwrap();
        assert_eq!(got2.id, second.id);
    }

    #[test]
    fn lifecycle_transitions_enforced() {
        let ledger = MemoryLedger::new();
        let row = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        ledger
            .update_state(&tenant(), &row.id, ObligationState::Planning, None, t0())
            .unwrap();
        assert!(matches!(
            ledger.update_state(&tenant(), &row.id, ObligationState::Completed, None, t0()),
            Err(LedgerError::InvalidTransition { .. })
        ));
        let failed = ledger
            .update_state(
                &tenant(),
                &row.id,
                ObligationState::Failed,
                Some("planner crashed".to_string()),
                t0(),
            )
            .unwrap();
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.error_log, vec!["planner crashed".to_string()]);
    }

    #[test]
    fn tenants_are_isolated() {
        let ledger = MemoryLedger::new();
        let other = TenantContext::new("tenant-b");
        let row = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        assert!(matches!(
            ledger.get(&other, &row.id),
            Err(LedgerError::NotFound(_))
        ));
        assert!(ledger.list_all(&other).unwrap().is_empty());
        // Same idempotency key in another tenant is a distinct row.
        let foreign = ledger.create(&other, new_ob("k1"), t0()).unwrap();
        assert_ne!(foreign.id, row.id);
        assert_eq!(foreign.previous_hash, LEDGER_GENESIS_HASH);
    }

    #[test]
    fn advisory_chain_verifies_and_detects_tampering() {
        use crate::verify_obligation_chain;

        let ledger = MemoryLedger::new();
        for key in ["k1", "k2", "k3"] {
            ledger.create(&tenant(), new_ob(key), t0()).unwrap();
        }
        let mut rows = ledger.list_all(&tenant()).unwrap();
        assert_eq!(verify_obligation_chain(&rows).unwrap(), 3);

        rows[1].intent = "rewritten".to_string();
        let err = verify_obligation_chain(&rows).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn empty_tenant_is_rejected() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.create(&TenantContext::new("  "), new_ob("k1"), t0()),
            Err(LedgerError::MissingTenant)
        ));
    }
}
