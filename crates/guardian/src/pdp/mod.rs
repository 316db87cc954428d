// Path: crates/guardian/src/pdp/mod.rs
//! Policy decision point backends.
//!
//! Every backend is fail-closed: transport errors, timeouts, bad statuses,
//! and malformed responses all come back as denials with a `DENY_<CAUSE>`
//! reason code and a stable `policy_ref`, never as transport errors the
//! guardian would have to interpret.

mod cedar;
mod native;
mod opa;

pub use cedar::CedarPdp;
pub use native::{NativePdp, NativeRule};
pub use opa::OpaPdp;

use helm_api::pdp::DecisionResponse;
use helm_crypto::algorithms::hash::content_hash_value;
use serde_json::json;
use std::time::Duration;

/// The default bound on one remote PDP request.
pub const DEFAULT_PDP_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds a response, computing the decision hash over the canonical
/// `{allow, reason_code, policy_ref}` triple.
pub(crate) fn finalize(allow: bool, reason_code: &str, policy_ref: &str) -> DecisionResponse {
    let decision_hash = content_hash_value(&json!({
        "allow": allow,
        "reason_code": reason_code,
        "policy_ref": policy_ref,
    }))
    // The triple contains no floats and no invalid strings; canonicalization
    // cannot fail on it.
    .map(|h| h.to_string())
    .unwrap_or_default();

    DecisionResponse {
        allow,
        reason_code: reason_code.to_string(),
        policy_ref: policy_ref.to_string(),
        decision_hash,
    }
}

/// Builds the fail-closed denial for a nil request.
pub(crate) fn deny_invalid_request(policy_ref: &str) -> DecisionResponse {
    finalize(false, "DENY_INVALID_REQUEST", policy_ref)
}
