// Path: crates/guardian/src/pdp/opa.rs

use super::{deny_invalid_request, finalize, DEFAULT_PDP_TIMEOUT};
use async_trait::async_trait;
use helm_api::pdp::{DecisionRequest, DecisionResponse, PdpBackend, PolicyDecisionPoint};
use helm_crypto::algorithms::hash::content_hash_value;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct OpaEnvelope {
    result: Option<OpaResult>,
}

#[derive(Deserialize)]
struct OpaResult {
    allow: bool,
    #[serde(default)]
    reason_code: Option<String>,
}

/// Open Policy Agent over HTTP: `POST <url>/v1/data/helm/authz` with the
/// request under `input`.
pub struct OpaPdp {
    client: reqwest::Client,
    base_url: String,
    policy_hash: String,
    policy_ref: String,
}

impl OpaPdp {
    /// Connects to an OPA instance with the default 5-second request bound.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_PDP_TIMEOUT)
    }

    /// Connects with an explicit per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let policy_hash = content_hash_value(&json!({"backend": "opa", "url": base_url}))
            .map(|h| h.to_string())
            .unwrap_or_default();
        let policy_ref = format!("opa:{base_url}/v1/data/helm/authz");
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url,
            policy_hash,
            policy_ref,
        }
    }
}

#[async_trait]
impl PolicyDecisionPoint for OpaPdp {
    async fn evaluate(&self, request: Option<&DecisionRequest>) -> DecisionResponse {
        let Some(request) = request else {
            return deny_invalid_request(&self.policy_ref);
        };

        let body = json!({
            "input": {
                "principal": request.principal,
                "action": request.action,
                "resource": request.resource,
                "context": request.context,
                "schema_hash": request.schema_hash,
                "environment": request.environment,
            }
        });

        let response = match self
            .client
            .post(format!("{}/v1/data/helm/authz", self.base_url))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(target: "pdp", backend = "opa", "request timed out");
                return finalize(false, "DENY_TIMEOUT", &self.policy_ref);
            }
            Err(e) => {
                tracing::warn!(target: "pdp", backend = "opa", error = %e, "unreachable");
                return finalize(false, "DENY_OPA_UNREACHABLE", &self.policy_ref);
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                target: "pdp",
                backend = "opa",
                status = %response.status(),
                "non-OK backend status"
            );
            return finalize(false, "DENY_BACKEND_STATUS", &self.policy_ref);
        }

        let envelope: OpaEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(_) => return finalize(false, "DENY_MALFORMED_RESPONSE", &self.policy_ref),
        };
        let Some(result) = envelope.result else {
            return finalize(false, "DENY_MALFORMED_RESPONSE", &self.policy_ref);
        };

        let reason = result.reason_code.unwrap_or_else(|| {
            if result.allow {
                "ALLOW_POLICY".to_string()
            } else {
                "DENY_POLICY".to_string()
            }
        });
        finalize(result.allow, &reason, &self.policy_ref)
    }

    fn backend(&self) -> PdpBackend {
        PdpBackend::Opa
    }

    fn policy_hash(&self) -> String {
        self.policy_hash.clone()
    }
}
