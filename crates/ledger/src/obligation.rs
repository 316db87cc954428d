// Path: crates/ledger/src/obligation.rs
//! Shared obligation-row helpers used by every ledger backend.

use chrono::{DateTime, Utc};
use helm_api::ledger::TenantContext;
use helm_crypto::algorithms::hash::append_linked;
use helm_types::app::Obligation;
use helm_types::codec;
use helm_types::error::LedgerError;

/// Computes an obligation's chain link:
/// `H(previous_hash ‖ id ‖ intent ‖ created_at)`, with the genesis previous
/// link being 64 zero hex characters.
pub fn obligation_link(
    previous_hash: &str,
    id: &str,
    intent: &str,
    created_at: DateTime<Utc>,
) -> String {
    let created = codec::format_timestamp(&created_at);
    append_linked(
        previous_hash,
        &[id.as_bytes(), intent.as_bytes(), created.as_bytes()],
    )
}

/// Recomputes a tenant's advisory hash chain over rows in creation order.
///
/// Returns the number of verified rows, or the index of the first row whose
/// recorded link does not recompute. The chain is advisory: it detects
/// tampering after the fact, it is not enforced transactionally on reads.
pub fn verify_obligation_chain(rows: &[Obligation]) -> Result<usize, LedgerError> {
    let mut previous = helm_types::LEDGER_GENESIS_HASH.to_string();
    for (index, row) in rows.iter().enumerate() {
        if row.previous_hash != previous
            || obligation_link(&row.previous_hash, &row.id, &row.intent, row.created_at)
                != row.hash
        {
            return Err(LedgerError::Backend(format!(
                "obligation chain broken at index {index}"
            )));
        }
        previous = row.hash.clone();
    }
    Ok(rows.len())
}

/// Rejects empty tenant contexts before any backend work happens.
pub(crate) fn require_tenant(tenant: &TenantContext) -> Result<(), LedgerError> {
    if tenant.tenant_id.trim().is_empty() {
        return Err(LedgerError::MissingTenant);
    }
    Ok(())
}

/// The lease compare-and-update predicate: a worker may take the lease iff
/// the row is unleased, the lease has expired, or the worker already holds
/// it (renewal).
pub(crate) fn lease_available(row: &Obligation, worker: &str, now: DateTime<Utc>) -> bool {
    match (&row.leased_by, row.leased_until) {
        (None, _) => true,
        (Some(holder), _) if holder == worker => true,
        (_, Some(until)) => until < now,
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use helm_types::app::ObligationState;
    use helm_types::LEDGER_GENESIS_HASH;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    fn row(leased_by: Option<&str>, leased_until: Option<DateTime<Utc>>) -> Obligation {
        Obligation {
            id: "ob-1".to_string(),
            idempotency_key: "key-1".to_string(),
            intent: "ship it".to_string(),
            state: ObligationState::Pending,
            created_at: t0(),
            updated_at: t0(),
            retry_count: 0,
            error_log: vec![],
            leased_by: leased_by.map(str::to_string),
            leased_until,
            hash: String::new(),
            previous_hash: LEDGER_GENESIS_HASH.to_string(),
            metadata: None,
            tenant_id: "tenant-a".to_string(),
        }
    }

    #[test]
    fn chain_link_depends_on_every_input() {
        let base = obligation_link(LEDGER_GENESIS_HASH, "ob-1", "intent", t0());
        assert_ne!(
            base,
            obligation_link(LEDGER_GENESIS_HASH, "ob-2", "intent", t0())
        );
        assert_ne!(
            base,
            obligation_link(LEDGER_GENESIS_HASH, "ob-1", "other", t0())
        );
        assert_ne!(base, obligation_link(&base, "ob-1", "intent", t0()));
    }

    #[test]
    fn lease_predicate_matches_compare_and_update_rule() {
        let now = t0();
        assert!(lease_available(&row(None, None), "w1", now));
        assert!(lease_available(&row(Some("w1"), Some(now + Duration::seconds(30))), "w1", now));
        assert!(!lease_available(&row(Some("w2"), Some(now + Duration::seconds(30))), "w1", now));
        // Expired lease may be stolen.
        assert!(lease_available(&row(Some("w2"), Some(now - Duration::seconds(1))), "w1", now));
    }
}
