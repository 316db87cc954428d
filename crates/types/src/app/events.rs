// Path: crates/types/src/app/events.rs

use crate::app::envelope::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only, hash-chained audit record.
///
/// `hash` covers the canonical entry with the `hash` field excluded;
/// `previous_hash` is the prior entry's `hash`, empty for the genesis entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id.
    pub id: String,
    /// Append time.
    #[serde(with = "crate::codec::ts")]
    pub timestamp: DateTime<Utc>,
    /// Who acted, e.g. `"guardian"`.
    pub actor: String,
    /// What happened, e.g. `"DECISION_MADE"`.
    pub action: String,
    /// What it happened to, e.g. a decision id.
    pub target: String,
    /// Free-form detail. The guardian writes canonical JSON here.
    pub details: String,
    /// The prior entry's hash; `""` for the genesis entry.
    pub previous_hash: String,
    /// Hash of this entry's canonical form with this field excluded.
    pub hash: String,
}

/// The kernel log unit: an event with full temporal provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id.
    pub event_id: String,
    /// The event type, e.g. `"decision.recorded"`.
    pub event_type: String,
    /// Monotonic, gap-free, 1-indexed position in the log.
    pub sequence_number: u64,
    /// When the event occurred at its source.
    #[serde(with = "crate::codec::ts")]
    pub observed_at: DateTime<Utc>,
    /// When the kernel received it.
    #[serde(with = "crate::codec::ts")]
    pub received_at: DateTime<Utc>,
    /// When the kernel durably committed it.
    #[serde(with = "crate::codec::ts")]
    pub committed_at: DateTime<Utc>,
    /// Canonical digest of `payload`.
    pub payload_hash: ContentHash,
    /// The event body.
    pub payload: serde_json::Value,
    /// The event id this event was caused by, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation: Option<String>,
    /// Optional entropy witness for replay analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy: Option<String>,
}
