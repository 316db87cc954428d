// Path: crates/ledger/src/events.rs
//! The kernel event log: gap-free sequence numbers and a running chain head.

use chrono::{DateTime, Utc};
use helm_crypto::algorithms::hash::{append_linked, content_hash_value};
use helm_types::app::EventEnvelope;
use helm_types::error::LedgerError;
use std::sync::Mutex;
use uuid::Uuid;

struct EventLogInner {
    events: Vec<EventEnvelope>,
    // Running chain over payload hashes; "" before the first event.
    head: String,
}

/// An in-memory, hash-linked event log.
///
/// Sequence numbers are monotonic, gap-free and 1-indexed per log instance.
/// The chain head links every committed payload hash through
/// `append_linked`, so the log's history is summarized by one digest.
pub struct EventLog {
    inner: Mutex<EventLogInner>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EventLogInner {
                events: Vec::new(),
                head: String::new(),
            }),
        }
    }

    /// Appends an event, assigning the next sequence number and committing
    /// it at `now`.
    pub fn append(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        observed_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
        now: DateTime<Utc>,
        causation: Option<String>,
    ) -> Result<EventEnvelope, LedgerError> {
        let payload_hash = content_hash_value(&payload)?;
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Backend("poisoned lock".to_string()))?;

        let event = EventEnvelope {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            sequence_number: inner.events.len() as u64 + 1,
            observed_at,
            received_at,
            committed_at: now,
            payload_hash: payload_hash.clone(),
            payload,
            causation,
            entropy: None,
        };
        inner.head = append_linked(&inner.head, &[payload_hash.as_str().as_bytes()]);
        inner.events.push(event.clone());
        Ok(event)
    }

    /// The current `(sequence, chain head)` pair. `(0, "")` when empty.
    pub fn head(&self) -> (u64, String) {
        self.inner
            .lock()
            .map(|inner| (inner.events.len() as u64, inner.head.clone()))
            .unwrap_or((0, String::new()))
    }

    /// Every event, in sequence order.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.inner
            .lock()
            .map(|inner| inner.events.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, secs).unwrap()
    }

    #[test]
    fn sequence_numbers_are_gap_free_and_one_indexed() {
        let log = EventLog::new();
        for i in 0..4u32 {
            let event = log
                .append("decision.recorded", json!({"n": i}), t(i), t(i), t(i), None)
                .unwrap();
            assert_eq!(event.sequence_number, u64::from(i) + 1);
        }
        let (seq, head) = log.head();
        assert_eq!(seq, 4);
        assert!(!head.is_empty());
    }

    #[test]
    fn head_changes_with_every_append() {
        let log = EventLog::new();
        log.append("a", json!({"x": 1}), t(0), t(0), t(0), None)
            .unwrap();
        let (_, head1) = log.head();
        log.append("a", json!({"x": 1}), t(1), t(1), t(1), None)
            .unwrap();
        let (_, head2) = log.head();
        assert_ne!(head1, head2);
    }

    #[test]
    fn causation_links_events() {
        let log = EventLog::new();
        let first = log
            .append("intent.issued", json!({"id": "i-1"}), t(0), t(0), t(0), None)
            .unwrap();
        let second = log
            .append(
                "receipt.recorded",
                json!({"id": "r-1"}),
                t(1),
                t(1),
                t(1),
                Some(first.event_id.clone()),
            )
            .unwrap();
        assert_eq!(second.causation.as_deref(), Some(first.event_id.as_str()));
    }
}
