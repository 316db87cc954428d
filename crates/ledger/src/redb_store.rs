// Path: crates/ledger/src/redb_store.rs

use crate::obligation::{lease_available, obligation_link, require_tenant};
use chrono::{DateTime, Duration, Utc};
use helm_api::ledger::{LedgerStore, TenantContext};
use helm_types::app::{NewObligation, Obligation, ObligationState};
use helm_types::error::LedgerError;
use helm_types::LEDGER_GENESIS_HASH;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// ---- Table definitions (single DB, prefix-encoded keys) ----
/// Rows: key = [tenant]\0[id], value = JSON obligation.
const OBLIGATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("OBLIGATIONS");
/// Idempotency index: key = [tenant]\0[idempotency_key], value = id.
const IDEMPOTENCY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("IDEMPOTENCY");
/// Dispatch index: key = [tenant]\0[created_at_be(8)][id], value = id.
/// Big-endian timestamps keep range scans in creation order.
const DISPATCH: TableDefinition<&[u8], &[u8]> = TableDefinition::new("DISPATCH");
/// Chain tails: key = [tenant], value = tail hash hex.
const TAILS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("TAILS");

fn k_row(tenant: &str, id: &str) -> Vec<u8> {
    [tenant.as_bytes(), &[0u8], id.as_bytes()].concat()
}
fn k_idem(tenant: &str, key: &str) -> Vec<u8> {
    [tenant.as_bytes(), &[0u8], key.as_bytes()].concat()
}
fn k_dispatch(tenant: &str, created_at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let ts = (created_at.timestamp_millis().max(0) as u64).to_be_bytes();
    [tenant.as_bytes(), &[0u8], ts.as_slice(), id.as_bytes()].concat()
}
fn tenant_prefix(tenant: &str) -> (Vec<u8>, Vec<u8>) {
    let low = [tenant.as_bytes(), &[0u8]].concat();
    let high = [tenant.as_bytes(), &[1u8]].concat();
    (low, high)
}

fn backend(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

fn encode_row(row: &Obligation) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(row).map_err(backend)
}

fn decode_row(bytes: &[u8]) -> Result<Obligation, LedgerError> {
    serde_json::from_slice(bytes).map_err(backend)
}

/// The durable obligation ledger over `redb`.
///
/// `redb` admits a single write transaction at a time, which is exactly the
/// serialization the lease compare-and-update and skip-locked dispatch need:
/// each operation reads, decides, and commits atomically, and two workers can
/// never observe the same row unleased.
#[derive(Clone)]
pub struct RedbLedger {
    db: Arc<Database>,
}

impl RedbLedger {
    /// Opens (and initializes) the ledger database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db = Database::create(path).map_err(backend)?;
        // Ensure tables exist.
        {
            let txn = db.begin_write().map_err(backend)?;
            {
                txn.open_table(OBLIGATIONS).map_err(backend)?;
                txn.open_table(IDEMPOTENCY).map_err(backend)?;
                txn.open_table(DISPATCH).map_err(backend)?;
                txn.open_table(TAILS).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
        }
        Ok(Self { db: Arc::new(db) })
    }

    fn read_row(&self, tenant: &str, id: &str) -> Result<Obligation, LedgerError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(OBLIGATIONS).map_err(backend)?;
        let key = k_row(tenant, id);
        let guard = table
            .get(key.as_slice())
            .map_err(backend)?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        decode_row(guard.value())
    }

    fn write_row_in<F, T>(&self, tenant: &str, id: &str, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Obligation) -> Result<T, LedgerError>,
    {
        let txn = self.db.begin_write().map_err(backend)?;
        let result = {
            let mut table = txn.open_table(OBLIGATIONS).map_err(backend)?;
            let key = k_row(tenant, id);
            let mut row = {
                let guard = table
                    .get(key.as_slice())
                    .map_err(backend)?
                    .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
                decode_row(guard.value())?
            };
            let result = f(&mut row)?;
            let encoded = encode_row(&row)?;
            table
                .insert(key.as_slice(), encoded.as_slice())
                .map_err(backend)?;
            result
        };
        txn.commit().map_err(backend)?;
        Ok(result)
    }
}

impl LedgerStore for RedbLedger {
    fn create(
        &self,
        tenant: &TenantContext,
        new: NewObligation,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let tenant_id = tenant.tenant_id.as_str();

        let txn = self.db.begin_write().map_err(backend)?;
        let row = {
            let mut obligations = txn.open_table(OBLIGATIONS).map_err(backend)?;
            let mut idempotency = txn.open_table(IDEMPOTENCY).map_err(backend)?;
            let mut dispatch = txn.open_table(DISPATCH).map_err(backend)?;
            let mut tails = txn.open_table(TAILS).map_err(backend)?;

            let idem_key = k_idem(tenant_id, &new.idempotency_key);
            let existing = idempotency
                .get(idem_key.as_slice())
                .map_err(backend)?
                .map(|guard| guard.value().to_vec());
            if let Some(existing_id) = existing {
                // Second create with the same key returns the original row.
                let id = String::from_utf8(existing_id).map_err(backend)?;
                let row_key = k_row(tenant_id, &id);
                let guard = obligations
                    .get(row_key.as_slice())
                    .map_err(backend)?
                    .ok_or_else(|| backend("idempotency index desync"))?;
                let row = decode_row(guard.value())?;
                drop(guard);
                row
            } else {
                let id = Uuid::new_v4().to_string();
                let previous_hash = tails
                    .get(tenant_id.as_bytes())
                    .map_err(backend)?
                    .map(|guard| String::from_utf8_lossy(guard.value()).to_string())
                    .unwrap_or_else(|| LEDGER_GENESIS_HASH.to_string());
                let hash = obligation_link(&previous_hash, &id, &new.intent, now);

                let row = Obligation {
                    id: id.clone(),
                    idempotency_key: new.idempotency_key.clone(),
                    intent: new.intent.clone(),
                    state: ObligationState::Pending,
                    created_at: now,
                    updated_at: now,
                    retry_count: 0,
                    error_log: vec![],
                    leased_by: None,
                    leased_until: None,
                    hash: hash.clone(),
                    previous_hash,
                    metadata: new.metadata.clone(),
                    tenant_id: tenant_id.to_string(),
                };

                let encoded = encode_row(&row)?;
                obligations
                    .insert(k_row(tenant_id, &id).as_slice(), encoded.as_slice())
                    .map_err(backend)?;
                idempotency
                    .insert(idem_key.as_slice(), id.as_bytes())
                    .map_err(backend)?;
                dispatch
                    .insert(
                        k_dispatch(tenant_id, now, &id).as_slice(),
                        id.as_bytes(),
                    )
                    .map_err(backend)?;
                tails
                    .insert(tenant_id.as_bytes(), hash.as_bytes())
                    .map_err(backend)?;
                row
            }
        };
        txn.commit().map_err(backend)?;
        Ok(row)
    }

    fn get(&self, tenant: &TenantContext, id: &str) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        self.read_row(&tenant.tenant_id, id)
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
        self.write_row_in(&tenant.tenant_id, id, |row| {
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
        })
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
        self.write_row_in(&tenant.tenant_id, id, |row| {
            if !lease_available(row, worker, now) {
                return Err(LedgerError::LockedByAnotherWorker);
            }
            row.leased_by = Some(worker.to_string());
            row.leased_until = Some(now + duration);
            row.updated_at = now;
            Ok(row.clone())
        })
    }

    fn acquire_next_pending(
        &self,
        tenant: &TenantContext,
        worker: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Obligation, LedgerError> {
        require_tenant(tenant)?;
        let tenant_id = tenant.tenant_id.as_str();

        let txn = self.db.begin_write().map_err(backend)?;
        let leased = {
            let mut obligations = txn.open_table(OBLIGATIONS).map_err(backend)?;
            let dispatch = txn.open_table(DISPATCH).map_err(backend)?;

            // Creation-ordered scan; rows claimed by other workers are
            // skipped, not waited on.
            let (low, high) = tenant_prefix(tenant_id);
            let mut chosen: Option<Obligation> = None;
            for item in dispatch
                .range(low.as_slice()..high.as_slice())
                .map_err(backend)?
            {
                let (_, id_guard) = item.map_err(backend)?;
                let id = String::from_utf8_lossy(id_guard.value()).to_string();
                let row_key = k_row(tenant_id, &id);
                let row = {
                    let guard = obligations
                        .get(row_key.as_slice())
                        .map_err(backend)?
                        .ok_or_else(|| backend("dispatch index desync"))?;
                    decode_row(guard.value())?
                };
                if row.state == ObligationState::Pending && lease_available(&row, worker, now) {
                    chosen = Some(row);
                    break;
                }
            }

            let Some(mut row) = chosen else {
                return Err(LedgerError::NoPendingObligations);
            };
            row.leased_by = Some(worker.to_string());
            row.leased_until = Some(now + duration);
            row.updated_at = now;
            let encoded = encode_row(&row)?;
            obligations
                .insert(k_row(tenant_id, &row.id).as_slice(), encoded.as_slice())
                .map_err(backend)?;
            row
        };
        txn.commit().map_err(backend)?;
        Ok(leased)
    }

    fn list_pending(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError> {
        Ok(self
            .list_all(tenant)?
            .into_iter()
            .filter(|row| row.state == ObligationState::Pending)
            .collect())
    }

    fn list_all(&self, tenant: &TenantContext) -> Result<Vec<Obligation>, LedgerError> {
        require_tenant(tenant)?;
        let tenant_id = tenant.tenant_id.as_str();
        let txn = self.db.begin_read().map_err(backend)?;
        let obligations = txn.open_table(OBLIGATIONS).map_err(backend)?;
        let dispatch = txn.open_table(DISPATCH).map_err(backend)?;

        let (low, high) = tenant_prefix(tenant_id);
        let mut rows = Vec::new();
        for item in dispatch
            .range(low.as_slice()..high.as_slice())
            .map_err(backend)?
        {
            let (_, id_guard) = item.map_err(backend)?;
            let id = String::from_utf8_lossy(id_guard.value()).to_string();
            let guard = obligations
                .get(k_row(tenant_id, &id).as_slice())
                .map_err(backend)?
                .ok_or_else(|| backend("dispatch index desync"))?;
            rows.push(decode_row(guard.value())?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    fn tenant() -> TenantContext {
        TenantContext::new("tenant-a")
    }

    fn open_ledger(dir: &tempfile::TempDir) -> RedbLedger {
        RedbLedger::open(dir.path().join("ledger.redb")).unwrap()
    }

    fn new_ob(key: &str) -> NewObligation {
        NewObligation {
            idempotency_key: key.to_string(),
            intent: format!("intent for {key}"),
            metadata: None,
        }
    }

    #[test]
    fn create_get_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let ledger = open_ledger(&dir);
            ledger.create(&tenant(), new_ob("k1"), t0()).unwrap().id
        };
        let ledger = RedbLedger::open(dir.path().join("ledger.redb")).unwrap();
        let row = ledger.get(&tenant(), &id).unwrap();
        assert_eq!(row.state, ObligationState::Pending);
        assert_eq!(row.previous_hash, LEDGER_GENESIS_HASH);
    }

    #[test]
    fn create_is_idempotent_and_chains() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let a = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        let again = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        assert_eq!(a.id, again.id);

        let b = ledger
            .create(&tenant(), new_ob("k2"), t0() + Duration::seconds(1))
            .unwrap();
        assert_eq!(b.previous_hash, a.hash);
        assert_eq!(ledger.list_all(&tenant()).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_dispatch_is_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();
        ledger
            .create(&tenant(), new_ob("k2"), t0() + Duration::seconds(1))
            .unwrap();

        let l1 = ledger.clone();
        let l2 = ledger.clone();
        let a = std::thread::spawn(move || {
            l1.acquire_next_pending(&tenant(), "w1", Duration::seconds(60), t0())
        });
        let b = std::thread::spawn(move || {
            l2.acquire_next_pending(&tenant(), "w2", Duration::seconds(60), t0())
        });
        let ra = a.join().unwrap().unwrap();
        let rb = b.join().unwrap().unwrap();
        assert_ne!(ra.id, rb.id);
    }

    #[test]
    fn lease_contention_returns_locked() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let row = ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        ledger
            .acquire_lease(&tenant(), &row.id, "w1", Duration::seconds(60), t0())
            .unwrap();
        assert!(matches!(
            ledger.acquire_lease(&tenant(), &row.id, "w2", Duration::seconds(60), t0()),
            Err(LedgerError::LockedByAnotherWorker)
        ));
    }

    #[test]
    fn dispatch_order_is_created_at_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let old = ledger.create(&tenant(), new_ob("k-old"), t0()).unwrap();
        ledger
            .create(&tenant(), new_ob("k-new"), t0() + Duration::seconds(5))
            .unwrap();

        let first = ledger
            .acquire_next_pending(&tenant(), "w1", Duration::seconds(60), t0())
            .unwrap();
        assert_eq!(first.id, old.id);
    }

    #[test]
    fn tenant_rows_never_leak() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        ledger.create(&tenant(), new_ob("k1"), t0()).unwrap();

        let other = TenantContext::new("tenant-b");
        assert!(ledger.list_all(&other).unwrap().is_empty());
        assert!(matches!(
            ledger.acquire_next_pending(&other, "w1", Duration::seconds(60), t0()),
            Err(LedgerError::NoPendingObligations)
        ));
    }
}
