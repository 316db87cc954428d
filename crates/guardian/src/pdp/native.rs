// Path: crates/guardian/src/pdp/native.rs

use super::{deny_invalid_request, finalize};
use async_trait::async_trait;
use helm_api::pdp::{DecisionRequest, DecisionResponse, PdpBackend, PolicyDecisionPoint};
use helm_crypto::algorithms::hash::content_hash_record;
use serde::{Deserialize, Serialize};

/// One native authorization rule. `"*"` matches anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeRule {
    /// Principal to match, or `"*"`.
    pub principal: String,
    /// Action to match, or `"*"`.
    pub action: String,
    /// Resource to match, or `"*"`.
    pub resource: String,
}

impl NativeRule {
    fn matches(&self, request: &DecisionRequest) -> bool {
        fn field(pattern: &str, value: &str) -> bool {
            pattern == "*" || pattern == value
        }
        field(&self.principal, &request.principal)
            && field(&self.action, &request.action)
            && field(&self.resource, &request.resource)
    }
}

/// The in-process PDP: a first-match allowlist with default deny.
pub struct NativePdp {
    rules: Vec<NativeRule>,
    policy_hash: String,
    policy_ref: String,
}

impl NativePdp {
    /// Builds the engine over an allowlist. The policy hash is the canonical
    /// content hash of the rule table.
    pub fn new(rules: Vec<NativeRule>) -> Self {
        let policy_hash = content_hash_record(&rules)
            .map(|h| h.to_string())
            .unwrap_or_default();
        let policy_ref = format!("helm:native:{policy_hash}");
        Self {
            rules,
            policy_hash,
            policy_ref,
        }
    }
}

#[async_trait]
impl PolicyDecisionPoint for NativePdp {
    async fn evaluate(&self, request: Option<&DecisionRequest>) -> DecisionResponse {
        let Some(request) = request else {
            return deny_invalid_request(&self.policy_ref);
        };
        if self.rules.iter().any(|rule| rule.matches(request)) {
            finalize(true, "ALLOW_POLICY", &self.policy_ref)
        } else {
            finalize(false, "DENY_POLICY", &self.policy_ref)
        }
    }

    fn backend(&self) -> PdpBackend {
        PdpBackend::Helm
    }

    fn policy_hash(&self) -> String {
        self.policy_hash.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn request(principal: &str, action: &str, resource: &str) -> DecisionRequest {
        DecisionRequest {
            principal: principal.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            context: json!({}),
            schema_hash: None,
            environment: None,
            timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn default_deny_with_first_match_allow() {
        let pdp = NativePdp::new(vec![NativeRule {
            principal: "*".into(),
            action: "EXECUTE_TOOL".into(),
            resource: "safe_tool".into(),
        }]);

        let allowed = pdp
            .evaluate(Some(&request("p", "EXECUTE_TOOL", "safe_tool")))
            .await;
        assert!(allowed.allow);
        assert_eq!(allowed.reason_code, "ALLOW_POLICY");

        let denied = pdp
            .evaluate(Some(&request("p", "EXECUTE_TOOL", "rogue_tool")))
            .await;
        assert!(!denied.allow);
        assert_eq!(denied.reason_code, "DENY_POLICY");
    }

    #[tokio::test]
    async fn nil_request_is_denied() {
        let pdp = NativePdp::new(vec![]);
        let response = pdp.evaluate(None).await;
        assert!(!response.allow);
        assert_eq!(response.reason_code, "DENY_INVALID_REQUEST");
        assert!(!response.policy_ref.is_empty());
    }

    #[test]
    fn policy_hash_tracks_rules() {
        let a = NativePdp::new(vec![]);
        let b = NativePdp::new(vec![NativeRule {
            principal: "*".into(),
            action: "*".into(),
            resource: "*".into(),
        }]);
        assert_ne!(a.policy_hash(), b.policy_hash());
    }
}
