// Path: crates/api/src/pdp.rs

//! The policy decision point (PDP) interface.
//!
//! The backend set is closed (native, OPA, Cedar), so the identifier is a
//! tagged enum; the call seam stays a trait so the guardian can hold any of
//! them (or none) behind one `Arc`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of supported PDP backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdpBackend {
    /// The in-process native engine.
    Helm,
    /// Open Policy Agent over HTTP.
    Opa,
    /// A Cedar agent over HTTP.
    Cedar,
}

impl PdpBackend {
    /// The canonical wire string for this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helm => "helm",
            Self::Opa => "opa",
            Self::Cedar => "cedar",
        }
    }
}

/// An authorization question put to a PDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// The principal requesting the effect.
    pub principal: String,
    /// The action, e.g. `EXECUTE_TOOL`.
    pub action: String,
    /// The resource or tool the action touches.
    pub resource: String,
    /// Structured request context.
    pub context: serde_json::Value,
    /// Hash of the schema the context conforms to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<String>,
    /// Deployment environment label, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// When the question was asked.
    #[serde(with = "helm_types::codec::ts")]
    pub timestamp: DateTime<Utc>,
}

/// A PDP's answer.
///
/// `decision_hash` is the canonical content hash of
/// `{allow, reason_code, policy_ref}` and is bound into the decision record
/// so the PDP's answer is tamper-evident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Whether the effect is authorized.
    pub allow: bool,
    /// Stable reason code; denials produced by failure carry `DENY_<CAUSE>`.
    pub reason_code: String,
    /// A stable reference to the policy that answered.
    pub policy_ref: String,
    /// Canonical hash of `{allow, reason_code, policy_ref}`.
    pub decision_hash: String,
}

/// A pluggable policy decision point.
///
/// Implementations MUST be fail-closed: any transport, serialization, or
/// timeout failure, and a nil request, produces
/// `{allow: false, reason_code: "DENY_<CAUSE>"}` rather than an error. The
/// guardian never sees a PDP transport failure as anything but a denial.
#[async_trait]
pub trait PolicyDecisionPoint: Send + Sync {
    /// Answers an authorization question. Never returns a transport error;
    /// failures become denials.
    async fn evaluate(&self, request: Option<&DecisionRequest>) -> DecisionResponse;

    /// Which backend this is.
    fn backend(&self) -> PdpBackend;

    /// A stable hash of the policy content currently in force.
    fn policy_hash(&self) -> String;
}
