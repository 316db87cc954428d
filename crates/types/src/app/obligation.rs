// Path: crates/types/src/app/obligation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle state of a durable obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationState {
    /// Created; awaiting a worker.
    Pending,
    /// A worker is producing a plan.
    Planning,
    /// A plan exists; awaiting execution.
    Planned,
    /// The plan is executing.
    Executing,
    /// Terminal: executed successfully.
    Completed,
    /// Terminal: execution failed.
    Failed,
    /// Terminal: blocked on an external condition.
    Blocked,
}

impl ObligationState {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Forward progress only; the three terminal states accept no exits.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ObligationState::*;
        matches!(
            (self, next),
            (Pending, Planning)
                | (Planning, Planned)
                | (Planned, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Executing, Blocked)
                | (Pending, Failed)
                | (Planning, Failed)
                | (Planned, Failed)
                | (Pending, Blocked)
                | (Planning, Blocked)
                | (Planned, Blocked)
        )
    }

    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    /// The canonical wire string for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Planning => "PLANNING",
            Self::Planned => "PLANNED",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        }
    }
}

/// A durable record of an agent's intent through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique obligation id.
    pub id: String,
    /// Caller-supplied uniqueness key; creating twice returns the same row.
    pub idempotency_key: String,
    /// The intent text or serialized intent object.
    pub intent: String,
    /// Current lifecycle state.
    pub state: ObligationState,
    /// Creation time.
    #[serde(with = "crate::codec::ts")]
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    #[serde(with = "crate::codec::ts")]
    pub updated_at: DateTime<Utc>,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Accumulated error descriptions, oldest first.
    #[serde(default)]
    pub error_log: Vec<String>,
    /// The worker currently holding the lease, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leased_by: Option<String>,
    /// Lease expiry, if leased.
    #[serde(with = "crate::codec::ts_opt", default)]
    pub leased_until: Option<DateTime<Utc>>,
    /// Chain link: `H(previous_hash ‖ id ‖ intent ‖ created_at)`.
    pub hash: String,
    /// The prior row's hash; 64 zero hex chars for the genesis row.
    pub previous_hash: String,
    /// Optional structured metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// The owning tenant. Required; all reads filter on it.
    pub tenant_id: String,
}

/// The caller-supplied portion of a new obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObligation {
    /// Uniqueness key for idempotent creation.
    pub idempotency_key: String,
    /// The intent text or serialized intent object.
    pub intent: String,
    /// Optional structured metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        use ObligationState::*;
        assert!(Pending.can_transition_to(Planning));
        assert!(Planning.can_transition_to(Planned));
        assert!(Planned.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Executing.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Executing));
    }

    #[test]
    fn wire_states_match_schema_check() {
        assert_eq!(
            serde_json::to_value(ObligationState::Executing).unwrap(),
            "EXECUTING"
        );
        assert_eq!(ObligationState::Blocked.as_str(), "BLOCKED");
    }
}
