// Path: crates/ledger/src/audit.rs
//! The append-only, hash-chained audit log.

use chrono::{DateTime, Utc};
use helm_crypto::algorithms::hash::append_linked;
use helm_types::app::AuditEntry;
use helm_types::codec;
use helm_types::error::AuditError;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Durable storage for audit entries. Append-only; entries are never
/// rewritten.
pub trait AuditStore: Send + Sync {
    /// Persists one entry at the end of the log.
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Loads every entry in append order.
    fn load_all(&self) -> Result<Vec<AuditEntry>, AuditError>;
}

/// In-memory audit storage for tests and shadow deployments.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates a stored entry in place. Test-only: exists so the tamper
    /// detection tests can corrupt history.
    pub fn corrupt<F: FnOnce(&mut AuditEntry)>(&self, index: usize, f: F) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(index) {
                f(entry);
            }
        }
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries
            .write()
            .map_err(|_| AuditError::Backend("poisoned lock".to_string()))?
            .push(entry.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| AuditError::Backend("poisoned lock".to_string()))?
            .clone())
    }
}

/// File-backed audit storage: one JSON entry per line, appended and synced.
pub struct FileAuditStore {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileAuditStore {
    /// Opens (and creates) the log file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(|e| AuditError::Backend(e.to_string()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl AuditStore for FileAuditStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line =
            serde_json::to_string(entry).map_err(|e| AuditError::AppendFailed(e.to_string()))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| AuditError::Backend("poisoned lock".to_string()))?;
        writeln!(file, "{line}").map_err(|e| AuditError::AppendFailed(e.to_string()))?;
        file.sync_data()
            .map_err(|e| AuditError::AppendFailed(e.to_string()))?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let raw =
            std::fs::read_to_string(&self.path).map_err(|e| AuditError::Backend(e.to_string()))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| AuditError::Backend(e.to_string()))
            })
            .collect()
    }
}

/// The audit log: single-writer append with hash chaining, and deterministic
/// chain verification.
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    // Serializes appends and carries the chain tail. `""` before genesis.
    tail: Mutex<String>,
}

impl AuditLog {
    /// Opens a log over a store, recovering the chain tail from history.
    pub fn open(store: Arc<dyn AuditStore>) -> Result<Self, AuditError> {
        let tail = store
            .load_all()?
            .last()
            .map(|entry| entry.hash.clone())
            .unwrap_or_default();
        Ok(Self {
            store,
            tail: Mutex::new(tail),
        })
    }

    /// Computes an entry's hash: the canonical entry with the `hash` member
    /// excluded.
    pub fn entry_hash(entry: &AuditEntry) -> Result<String, AuditError> {
        let mut value = codec::to_canonical_value(entry)?;
        if let Value::Object(map) = &mut value {
            map.remove("hash");
        }
        let bytes = codec::jcs(&value)?;
        Ok(append_linked("", &[&bytes]))
    }

    /// Appends one entry. The append is serialized per log instance; the
    /// caller treats failure as fatal for whatever the entry records.
    pub fn append(
        &self,
        actor: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        details: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        let mut tail = self
            .tail
            .lock()
            .map_err(|_| AuditError::Backend("poisoned lock".to_string()))?;

        let mut entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            actor: actor.into(),
            action: action.into(),
            target: target.into(),
            details: details.into(),
            previous_hash: tail.clone(),
            hash: String::new(),
        };
        entry.hash = Self::entry_hash(&entry)?;

        self.store.append(&entry)?;
        *tail = entry.hash.clone();
        tracing::debug!(
            target: "audit",
            action = %entry.action,
            target_id = %entry.target,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Recomputes every entry and cross-checks the links.
    ///
    /// The first breaking index is reported with the failure kind
    /// distinguished: a recomputed-hash mismatch is
    /// `IntegrityFailureAtIndex`, a broken `previous_hash` link is
    /// `ChainBrokenAtIndex`.
    pub fn verify_chain(&self) -> Result<usize, AuditError> {
        let entries = self.store.load_all()?;
        let mut previous = String::new();
        for (index, entry) in entries.iter().enumerate() {
            if Self::entry_hash(entry)? != entry.hash {
                return Err(AuditError::IntegrityFailureAtIndex(index));
            }
            if entry.previous_hash != previous {
                return Err(AuditError::ChainBrokenAtIndex(index));
            }
            previous = entry.hash.clone();
        }
        Ok(entries.len())
    }

    /// Every entry, in append order.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        self.store.load_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, secs).unwrap()
    }

    fn log_with_entries(n: u32) -> (AuditLog, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::new());
        let log = AuditLog::open(store.clone()).unwrap();
        for i in 0..n {
            log.append(
                "guardian",
                "DECISION_MADE",
                format!("decision-{i}"),
                format!("{{\"verdict\":\"PASS\",\"n\":{i}}}"),
                t(i),
            )
            .unwrap();
        }
        (log, store)
    }

    #[test]
    fn genesis_previous_hash_is_empty() {
        let (log, _) = log_with_entries(1);
        let entries = log.entries().unwrap();
        assert_eq!(entries[0].previous_hash, "");
        assert_eq!(log.verify_chain().unwrap(), 1);
    }

    #[test]
    fn chain_links_and_verifies() {
        let (log, _) = log_with_entries(5);
        let entries = log.entries().unwrap();
        for window in entries.windows(2) {
            assert_eq!(window[1].previous_hash, window[0].hash);
        }
        assert_eq!(log.verify_chain().unwrap(), 5);
    }

    #[test]
    fn mutated_details_detected_at_exact_index() {
        let (log, store) = log_with_entries(3);
        store.corrupt(1, |entry| {
            entry.details.push('x');
        });
        let err = log.verify_chain().unwrap_err();
        assert!(matches!(err, AuditError::IntegrityFailureAtIndex(1)));
        assert_eq!(err.to_string(), "integrity failure at index 1");
    }

    #[test]
    fn broken_link_detected_at_exact_index() {
        let (log, store) = log_with_entries(3);
        store.corrupt(2, |entry| {
            // Recompute the hash so the entry is self-consistent but the
            // link to its predecessor is severed.
            entry.previous_hash = "deadbeef".to_string();
            entry.hash = AuditLog::entry_hash(entry).unwrap();
        });
        let err = log.verify_chain().unwrap_err();
        assert!(matches!(err, AuditError::ChainBrokenAtIndex(2)));
        assert_eq!(err.to_string(), "chain broken at index 2");
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let store = Arc::new(FileAuditStore::open(&path).unwrap());
            let log = AuditLog::open(store).unwrap();
            log.append("guardian", "DECISION_MADE", "d-1", "{}", t(0))
                .unwrap();
            log.append("guardian", "DECISION_MADE", "d-2", "{}", t(1))
                .unwrap();
        }
        let store = Arc::new(FileAuditStore::open(&path).unwrap());
        let log = AuditLog::open(store).unwrap();
        assert_eq!(log.verify_chain().unwrap(), 2);
        // The recovered tail continues the chain.
        let entry = log
            .append("guardian", "DECISION_MADE", "d-3", "{}", t(2))
            .unwrap();
        assert!(!entry.previous_hash.is_empty());
        assert_eq!(log.verify_chain().unwrap(), 3);
    }
}
