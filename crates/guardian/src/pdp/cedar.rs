// Path: crates/guardian/src/pdp/cedar.rs

use super::{deny_invalid_request, finalize, DEFAULT_PDP_TIMEOUT};
use async_trait::async_trait;
use helm_api::pdp::{DecisionRequest, DecisionResponse, PdpBackend, PolicyDecisionPoint};
use helm_crypto::algorithms::hash::content_hash_value;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct CedarEnvelope {
    decision: Option<String>,
    #[serde(default)]
    diagnostics: CedarDiagnostics,
}

#[derive(Deserialize, Default)]
struct CedarDiagnostics {
    #[serde(default)]
    reason: Vec<String>,
}

/// A Cedar agent over HTTP: `POST <url>/decide`.
pub struct CedarPdp {
    client: reqwest::Client,
    base_url: String,
    policy_hash: String,
    policy_ref: String,
}

impl CedarPdp {
    /// Connects to a Cedar agent with the default 5-second request bound.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_PDP_TIMEOUT)
    }

    /// Connects with an explicit per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let policy_hash = content_hash_value(&json!({"backend": "cedar", "url": base_url}))
            .map(|h| h.to_string())
            .unwrap_or_default();
        let policy_ref = format!("cedar:{base_url}/decide");
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
impl PolicyDecisionPoint for CedarPdp {
    async fn evaluate(&self, request: Option<&DecisionRequest>) -> DecisionResponse {
        let Some(request) = request else {
            return deny_invalid_request(&self.policy_ref);
        };

        let body = json!({
            "principal": request.principal,
            "action": request.action,
            "resource": request.resource,
            "context": request.context,
            "entities": [],
        });

        let response = match self
            .client
            .post(format!("{}/decide", self.base_url))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(target: "pdp", backend = "cedar", "request timed out");
                return finalize(false, "DENY_TIMEOUT", &self.policy_ref);
            }
            Err(e) => {
                tracing::warn!(target: "pdp", backend = "cedar", error = %e, "unreachable");
                return finalize(false, "DENY_CEDAR_UNREACHABLE", &self.policy_ref);
            }
        };

        if !response.status().is_success() {
            return finalize(false, "DENY_BACKEND_STATUS", &self.policy_ref);
        }

        let envelope: CedarEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(_) => return finalize(false, "DENY_MALFORMED_RESPONSE", &self.policy_ref),
        };

        match envelope.decision.as_deref() {
            Some("Allow") => finalize(true, "ALLOW_POLICY", &self.policy_ref),
            Some("Deny") => {
                let reason = envelope
                    .diagnostics
                    .reason
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "DENY_POLICY".to_string());
                finalize(false, &reason, &self.policy_ref)
            }
            _ => finalize(false, "DENY_MALFORMED_RESPONSE", &self.policy_ref),
        }
    }

    fn backend(&self) -> PdpBackend {
        PdpBackend::Cedar
    }

    fn policy_hash(&self) -> String {
        self.policy_hash.clone()
    }
}
