// Path: crates/guardian/src/core.rs
//! The guardian core: composes the registry, requirement graph, PDP,
//! temporal envelope, budgets, signer, and audit log into the decision
//! pipeline.
//!
//! Ownership is one-directional: the guardian holds strong references to its
//! collaborators and nothing holds a reference back. The temporal envelope
//! and the signer are owned exclusively for the guardian's lifetime.

use crate::budget::BudgetTracker;
use crate::prg::{graph_content_hash, requirement_set_hash, PolicyEngine};
use crate::signer::RecordSigner;
use crate::temporal::{ResponseLevel, TemporalGuardian, TemporalPolicy};
use chrono::Duration;
use helm_api::clock::Clock;
use helm_api::pdp::{DecisionRequest, PolicyDecisionPoint};
use helm_crypto::algorithms::hash::{content_hash_record, content_hash_value};
use helm_ledger::{AuditLog, EventLog};
use helm_storage::ArtifactRegistry;
use helm_types::app::{
    AuthorizedExecutionIntent, ContentHash, Cost, DecisionRecord, Effect, EffectRequest,
    ExecutionReceipt, Graph, Intervention, InterventionKind, ReceiptOutcome, Verdict,
};
use helm_types::codec;
use helm_types::config::KernelConfig;
use helm_types::error::{GuardianError, PolicyError, RegistryError};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Policy version bound into decisions when no requirement graph is loaded.
const FALLBACK_POLICY_VERSION: &str = "0.1.0";

/// Builds a [`Guardian`] from its injected collaborators.
pub struct GuardianBuilder {
    registry: Arc<ArtifactRegistry>,
    signer: RecordSigner,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    graph: Option<Graph>,
    engine: PolicyEngine,
    pdp: Option<Arc<dyn PolicyDecisionPoint>>,
    budgets: Arc<BudgetTracker>,
    temporal_policy: TemporalPolicy,
    config: Option<KernelConfig>,
    events: Option<Arc<EventLog>>,
}

impl GuardianBuilder {
    /// Starts a builder with the required collaborators.
    pub fn new(
        registry: Arc<ArtifactRegistry>,
        signer: RecordSigner,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            signer,
            audit,
            clock,
            graph: None,
            engine: PolicyEngine::new(),
            pdp: None,
            budgets: Arc::new(BudgetTracker::new()),
            // No thresholds: the envelope observes but never escalates.
            temporal_policy: TemporalPolicy::new(Duration::seconds(10), Vec::new()),
            config: None,
            events: None,
        }
    }

    /// Installs the proof requirement graph.
    pub fn graph(mut self, graph: Graph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Installs a custom policy engine (expression budgets).
    pub fn engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Installs a policy decision point.
    pub fn pdp(mut self, pdp: Arc<dyn PolicyDecisionPoint>) -> Self {
        self.pdp = Some(pdp);
        self
    }

    /// Shares a budget tracker.
    pub fn budgets(mut self, budgets: Arc<BudgetTracker>) -> Self {
        self.budgets = budgets;
        self
    }

    /// Installs the temporal policy.
    pub fn temporal_policy(mut self, policy: TemporalPolicy) -> Self {
        self.temporal_policy = policy;
        self
    }

    /// Binds the boot configuration into the environment fingerprint and
    /// enables shadow mode when the configuration asks for it.
    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Streams pipeline events (decisions recorded, intents issued) into a
    /// kernel event log.
    pub fn events(mut self, events: Arc<EventLog>) -> Self {
        self.events = Some(events);
        self
    }

    /// Assembles the guardian, computing the boot environment fingerprint.
    pub fn build(self) -> Guardian {
        let policy_version = self
            .graph
            .as_ref()
            .and_then(|graph| graph_content_hash(graph).ok())
            .unwrap_or_else(|| FALLBACK_POLICY_VERSION.to_string());

        let env_fingerprint = content_hash_value(&json!({
            "kernel_version": env!("CARGO_PKG_VERSION"),
            "policy_version": policy_version,
            "config": &self.config,
        }))
        .map(|h| h.to_string())
        .unwrap_or_default();

        let shadow_mode = self.config.as_ref().map(|c| c.shadow_mode).unwrap_or(false);
        let temporal = TemporalGuardian::new(self.clock.clone(), self.temporal_policy);

        Guardian {
            registry: self.registry,
            graph: self.graph,
            engine: self.engine,
            pdp: self.pdp,
            temporal,
            budgets: self.budgets,
            signer: self.signer,
            audit: self.audit,
            clock: self.clock,
            env_fingerprint,
            shadow_mode,
            events: self.events,
        }
    }
}

/// The enforcement kernel's decision authority.
pub struct Guardian {
    registry: Arc<ArtifactRegistry>,
    graph: Option<Graph>,
    engine: PolicyEngine,
    pdp: Option<Arc<dyn PolicyDecisionPoint>>,
    temporal: TemporalGuardian,
    budgets: Arc<BudgetTracker>,
    signer: RecordSigner,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    env_fingerprint: String,
    shadow_mode: bool,
    events: Option<Arc<EventLog>>,
}

impl Guardian {
    /// Starts a builder.
    pub fn builder(
        registry: Arc<ArtifactRegistry>,
        signer: RecordSigner,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> GuardianBuilder {
        GuardianBuilder::new(registry, signer, audit, clock)
    }

    /// The policy version currently in force, derived from the requirement
    /// graph's content hash on demand.
    pub fn policy_version(&self) -> String {
        self.graph
            .as_ref()
            .and_then(|graph| graph_content_hash(graph).ok())
            .unwrap_or_else(|| FALLBACK_POLICY_VERSION.to_string())
    }

    /// The boot-sequence environment fingerprint bound into every decision.
    pub fn env_fingerprint(&self) -> &str {
        &self.env_fingerprint
    }

    /// The signer's verifying key, for external record verification.
    pub fn verifying_key(&self) -> helm_crypto::sign::Ed25519PublicKey {
        self.signer.public_key()
    }

    /// Evaluates one effect request into a signed decision record.
    ///
    /// The record seeds as FAIL (default-deny) and only a fully satisfied
    /// pipeline upgrades it. Missing referenced evidence is a hard error:
    /// the request is malformed, and no decision is produced for it. An
    /// audit append failure is fatal: a decision that cannot be recorded is
    /// never returned.
    pub async fn evaluate_decision(
        &self,
        request: &EffectRequest,
    ) -> Result<DecisionRecord, GuardianError> {
        // 1. Materialize the effect and its canonical digest.
        let effect = Effect {
            id: request.id.clone(),
            effect_type: request.action.clone(),
            params: request.context.clone(),
        };
        let effect_digest = content_hash_record(&effect)?;

        // 2. Seed the record: default-deny.
        let mut decision = DecisionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            verdict: Verdict::Fail,
            effect_digest,
            input_context: request.context.clone(),
            env_fingerprint: self.env_fingerprint.clone(),
            policy_version: self.policy_version(),
            policy_backend: None,
            policy_content_hash: None,
            policy_decision_hash: None,
            requirement_set_hash: None,
            intervention: None,
            reason: None,
            signature: None,
        };

        // 3. Policy decision point, when configured. Backends are
        // fail-closed, so every failure arrives as a denial.
        if let Some(pdp) = &self.pdp {
            let pdp_request = DecisionRequest {
                principal: request.principal.clone(),
                action: request.action.clone(),
                resource: request.resource.clone(),
                context: request.context.clone(),
                schema_hash: None,
                environment: None,
                timestamp: decision.timestamp,
            };
            let response = pdp.evaluate(Some(&pdp_request)).await;
            decision.policy_backend = Some(pdp.backend().as_str().to_string());
            decision.policy_content_hash = Some(pdp.policy_hash());
            decision.policy_decision_hash = Some(response.decision_hash.clone());
            if !response.allow {
                decision.reason = Some(format!("PDP denied: {}", response.reason_code));
                return self.finalize(decision);
            }
        }

        // 4. Temporal envelope.
        let temporal = self.temporal.evaluate();
        let intervention = match temporal.level {
            ResponseLevel::Observe => None,
            level => Some(Intervention {
                kind: intervention_kind(level),
                reason_code: level.reason_code().to_string(),
                wait_ms: temporal.hold.num_milliseconds().max(0) as u64,
            }),
        };

        // 5. The decision gate sequence.
        let action_id = request
            .context
            .get("tool_name")
            .and_then(|v| v.as_str())
            .unwrap_or(&effect.effect_type)
            .to_string();

        if let Some(intervention) = intervention {
            if intervention.kind == InterventionKind::Throttle {
                // Throttled effects still flow; the intervention rides along.
                decision.intervention = Some(intervention);
            } else {
                decision.verdict = Verdict::Intervene;
                decision.reason = Some(intervention.reason_code.clone());
                decision.intervention = Some(intervention);
                return self.finalize(decision);
            }
        }

        // Budget reservation at one request per decision.
        if let Some(budget_id) = request.context.get("budget_id").and_then(|v| v.as_str()) {
            match self
                .budgets
                .check(budget_id, Cost::one_request(), decision.timestamp)
            {
                Err(e) => {
                    decision.reason = Some(format!("Budget Error: {e}"));
                    return self.finalize(decision);
                }
                Ok(false) => {
                    decision.reason = Some(format!("Budget Exceeded: {budget_id}"));
                    return self.finalize(decision);
                }
                Ok(true) => {
                    if let Err(e) =
                        self.budgets
                            .consume(budget_id, Cost::one_request(), decision.timestamp)
                    {
                        // The check already authorized this spend; a racing
                        // consume is recorded but does not block the effect.
                        tracing::warn!(
                            target: "guardian",
                            budget_id,
                            error = %e,
                            "budget consume failed after positive check"
                        );
                    }
                }
            }
        }

        // Envelope sanity.
        if effect.id.trim().is_empty() || effect.effect_type.trim().is_empty() {
            decision.reason = Some("Envelope Violation".to_string());
            return self.finalize(decision);
        }

        // PRG lookup: default-deny on an unknown action.
        let rule = self.graph.as_ref().and_then(|graph| graph.rule(&action_id));
        let Some(rule) = rule else {
            decision.reason = Some(format!("no policy defined for action {action_id}"));
            return self.finalize(decision);
        };

        // Evidence fetch. A missing reference is the caller's defect, not a
        // policy outcome: hard error, no decision.
        let mut artifacts = Vec::with_capacity(request.evidence.len());
        for hash in &request.evidence {
            match self.registry.get(hash.as_str()) {
                Ok(envelope) => artifacts.push(envelope),
                Err(RegistryError::NotFound(h)) => {
                    return Err(GuardianError::MissingEvidence(h))
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Activation context for the requirement graph.
        let activation = json!({
            "action": action_id,
            "effect": codec::to_canonical_value(&effect)?,
            "artifacts": codec::to_canonical_value(&artifacts)?,
            "timestamp": codec::format_timestamp(&decision.timestamp),
            "input": request.context,
        });

        match self
            .engine
            .evaluate_requirement_set(rule, &activation, &artifacts)
        {
            Err(e) => {
                decision.reason = Some(format!("PRG Evaluation Error: {e}"));
                self.finalize(decision)
            }
            Ok(false) => {
                decision.reason = Some("missing requirement".to_string());
                self.finalize(decision)
            }
            Ok(true) => {
                decision.verdict = Verdict::Pass;
                decision.requirement_set_hash =
                    Some(requirement_set_hash(rule).map_err(policy_internal)?);
                decision.timestamp = self.clock.now();
                self.finalize(decision)
            }
        }
    }

    /// Signs the record and persists it to the audit chain. Failure of
    /// either step is fatal: the caller never sees an unsigned or
    /// unrecorded decision.
    fn finalize(&self, mut decision: DecisionRecord) -> Result<DecisionRecord, GuardianError> {
        self.signer.sign_decision(&mut decision)?;
        let details = codec::jcs_string(&codec::to_canonical_value(&decision)?)?;
        self.audit
            .append(
                "guardian",
                "DECISION_MADE",
                decision.id.clone(),
                details,
                decision.timestamp,
            )
            .map_err(GuardianError::Audit)?;
        tracing::info!(
            target: "guardian",
            decision_id = %decision.id,
            verdict = ?decision.verdict,
            reason = decision.reason.as_deref().unwrap_or(""),
            "decision recorded"
        );
        self.emit_event(
            "decision.recorded",
            json!({"decision_id": decision.id, "verdict": decision.verdict}),
            None,
        );
        Ok(decision)
    }

    /// Streams one pipeline event. The event log is observability, not the
    /// record of authority; a failed append is logged and swallowed.
    fn emit_event(&self, event_type: &str, payload: serde_json::Value, causation: Option<String>) {
        let Some(events) = &self.events else {
            return;
        };
        let now = self.clock.now();
        if let Err(e) = events.append(event_type, payload, now, now, now, causation) {
            tracing::warn!(target: "guardian", error = %e, event_type, "event append failed");
        }
    }

    /// Issues the short-lived execution intent for a PASS decision.
    ///
    /// Permitted only for PASS records whose signature verifies. The intent
    /// expires exactly five minutes after issue; there is no renewal.
    pub fn issue_execution_intent(
        &self,
        decision: &DecisionRecord,
        allowed_tool: &str,
    ) -> Result<AuthorizedExecutionIntent, GuardianError> {
        if self.shadow_mode {
            return Err(GuardianError::IntentRefused(
                "shadow mode: decisions are recorded but never executed".to_string(),
            ));
        }
        if decision.verdict != Verdict::Pass {
            return Err(GuardianError::IntentRefused(format!(
                "verdict is {:?}, not PASS",
                decision.verdict
            )));
        }
        if let Err(e) = self.signer.verify_decision(decision) {
            return Err(GuardianError::IntentRefused(format!(
                "decision signature invalid: {e}"
            )));
        }

        let issued_at = self.clock.now();
        let mut intent = AuthorizedExecutionIntent {
            id: format!("intent-{}", decision.id),
            decision_id: decision.id.clone(),
            effect_digest_hash: decision.effect_digest.clone(),
            allowed_tool: allowed_tool.to_string(),
            issued_at,
            expires_at: issued_at + AuthorizedExecutionIntent::ttl(),
            signer: self.signer.signer_id().to_string(),
            signature: None,
        };
        self.signer.sign_intent(&mut intent)?;
        tracing::info!(
            target: "guardian",
            intent_id = %intent.id,
            tool = %intent.allowed_tool,
            "execution intent issued"
        );
        self.emit_event(
            "intent.issued",
            json!({"intent_id": intent.id, "decision_id": intent.decision_id}),
            Some(intent.decision_id.clone()),
        );
        Ok(intent)
    }

    /// Signs the outcome record for an executed intent.
    pub fn issue_receipt(
        &self,
        intent: &AuthorizedExecutionIntent,
        outcome: ReceiptOutcome,
        output_digest: Option<ContentHash>,
        error_code: Option<String>,
    ) -> Result<ExecutionReceipt, GuardianError> {
        if let Err(e) = self.signer.verify_intent(intent) {
            return Err(GuardianError::IntentRefused(format!(
                "intent signature invalid: {e}"
            )));
        }
        let mut receipt = ExecutionReceipt {
            id: format!("receipt-{}", intent.id),
            intent_id: intent.id.clone(),
            decision_id: intent.decision_id.clone(),
            executed_at: self.clock.now(),
            outcome,
            output_digest,
            error_code,
            signer: self.signer.signer_id().to_string(),
            signature: None,
        };
        self.signer.sign_receipt(&mut receipt)?;
        Ok(receipt)
    }

    /// Verifies a decision produced by this guardian's key.
    pub fn verify_decision(&self, decision: &DecisionRecord) -> bool {
        self.signer.verify_decision(decision).is_ok()
    }

    /// Verifies an intent produced by this guardian's key.
    pub fn verify_intent(&self, intent: &AuthorizedExecutionIntent) -> bool {
        self.signer.verify_intent(intent).is_ok()
    }
}

fn intervention_kind(level: ResponseLevel) -> InterventionKind {
    match level {
        ResponseLevel::Observe | ResponseLevel::Throttle => InterventionKind::Throttle,
        ResponseLevel::Interrupt => InterventionKind::Interrupt,
        ResponseLevel::Quarantine => InterventionKind::Quarantine,
        ResponseLevel::FailClosed => InterventionKind::FailClosed,
    }
}

fn policy_internal(e: PolicyError) -> GuardianError {
    match e {
        PolicyError::Canon(c) => GuardianError::Canon(c),
        other => GuardianError::Internal(other.to_string()),
    }
}
