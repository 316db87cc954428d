// Path: crates/types/src/app/decision.rs

use crate::app::envelope::ContentHash;
use crate::INTENT_TTL_SECS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The verdict of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// The effect is authorized.
    Pass,
    /// The effect is denied.
    Fail,
    /// The effect is suspended by a temporal intervention.
    Intervene,
}

/// The graded intervention applied by the temporal guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionKind {
    /// Delay the effect; it may still proceed.
    Throttle,
    /// Suspend the effect for the hold duration.
    Interrupt,
    /// Suspend and flag the actor for review.
    Quarantine,
    /// Deny everything until the hold elapses.
    FailClosed,
}

/// Intervention metadata bound into a decision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    /// The graded response level applied.
    pub kind: InterventionKind,
    /// Stable reason code, e.g. `TEMPORAL_INTERRUPT`.
    pub reason_code: String,
    /// How long the caller must wait before re-attempting, in milliseconds.
    pub wait_ms: u64,
}

/// An effect request as submitted to the guardian.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectRequest {
    /// Caller-supplied request id; also the effect id.
    pub id: String,
    /// The principal on whose behalf the effect runs.
    pub principal: String,
    /// The requested action, e.g. `EXECUTE_TOOL`.
    pub action: String,
    /// The resource or tool the action touches.
    pub resource: String,
    /// Structured parameters of the effect. `tool_name` and `budget_id` are
    /// recognized members.
    pub context: serde_json::Value,
    /// Content hashes of evidence artifacts backing this request.
    #[serde(default)]
    pub evidence: Vec<ContentHash>,
}

/// The materialized effect whose canonical digest is bound into decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    /// The effect id (same as the request id).
    pub id: String,
    /// The effect type (the request's action).
    #[serde(rename = "type")]
    pub effect_type: String,
    /// The request context, verbatim.
    pub params: serde_json::Value,
}

/// The signed verdict produced by the guardian for one effect request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique decision id.
    pub id: String,
    /// Authority-clock time of the decision.
    #[serde(with = "crate::codec::ts")]
    pub timestamp: DateTime<Utc>,
    /// The verdict.
    pub verdict: Verdict,
    /// Canonical digest of the materialized effect.
    pub effect_digest: ContentHash,
    /// The request context, bound verbatim.
    pub input_context: serde_json::Value,
    /// Boot-sequence hash of the environment that decided.
    pub env_fingerprint: String,
    /// The PRG content hash (or PDP policy hash) in force.
    pub policy_version: String,
    /// The PDP backend consulted, when one was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_backend: Option<String>,
    /// Content hash of the PDP policy document, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_content_hash: Option<String>,
    /// Canonical hash of the PDP's decision response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_decision_hash: Option<String>,
    /// Hash of the requirement set that passed. Present only on PASS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_set_hash: Option<String>,
    /// Temporal intervention metadata, when one applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<Intervention>,
    /// Human-readable reason for FAIL and INTERVENE verdicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Hex signature over the canonical record with this field excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A short-lived, signed permission to execute one specific effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedExecutionIntent {
    /// `"intent-" + decision_id`. Unique per decision.
    pub id: String,
    /// The PASS decision this intent executes.
    pub decision_id: String,
    /// The effect digest the intent is bound to.
    pub effect_digest_hash: ContentHash,
    /// The single tool the intent permits.
    pub allowed_tool: String,
    /// Issue time.
    #[serde(with = "crate::codec::ts")]
    pub issued_at: DateTime<Utc>,
    /// Absolute expiry: `issued_at` + 5 minutes. No renewal.
    #[serde(with = "crate::codec::ts")]
    pub expires_at: DateTime<Utc>,
    /// The signing identity, `"kernel"`.
    pub signer: String,
    /// Hex signature over the canonical intent with this field excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl AuthorizedExecutionIntent {
    /// The fixed intent lifetime.
    pub fn ttl() -> Duration {
        Duration::seconds(INTENT_TTL_SECS)
    }

    /// Whether the intent has expired at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The outcome of executing an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptOutcome {
    /// The effect executed and committed.
    Success,
    /// The effect failed to execute or commit.
    Failure,
}

/// The signed record of the outcome of executing an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// `"receipt-" + intent_id`.
    pub id: String,
    /// The intent that was executed.
    pub intent_id: String,
    /// The originating decision.
    pub decision_id: String,
    /// Execution completion time.
    #[serde(with = "crate::codec::ts")]
    pub executed_at: DateTime<Utc>,
    /// The outcome.
    pub outcome: ReceiptOutcome,
    /// Canonical digest of the effect output, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_digest: Option<ContentHash>,
    /// Stable error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// The signing identity.
    pub signer: String,
    /// Hex signature over the canonical receipt with this field excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}
