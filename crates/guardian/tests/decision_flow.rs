// Path: crates/guardian/tests/decision_flow.rs
//! End-to-end decision pipeline scenarios.

use chrono::Duration;
use helm_api::clock::Clock;
use helm_guardian::pdp::OpaPdp;
use helm_guardian::{
    graph_content_hash, BudgetTracker, Guardian, RecordSigner, ResponseLevel, TemporalPolicy,
    ThresholdPolicy,
};
use helm_crypto::sign::Ed25519KeyPair;
use helm_ledger::{AuditLog, MemoryAuditStore};
use helm_storage::{ArtifactRegistry, ContentStore, MemoryStore};
use helm_test_utils::{fixtures, ManualClock};
use helm_types::app::{
    Budget, ContentHash, InterventionKind, ReceiptOutcome, ResourceType, Verdict,
};
use helm_types::error::{AuditError, GuardianError};
use std::sync::Arc;

struct Harness {
    guardian: Guardian,
    registry: Arc<ArtifactRegistry>,
    audit_store: Arc<MemoryAuditStore>,
    audit: Arc<AuditLog>,
    clock: Arc<ManualClock>,
    budgets: Arc<BudgetTracker>,
}

fn harness(configure: impl FnOnce(helm_guardian::GuardianBuilder) -> helm_guardian::GuardianBuilder) -> Harness {
    let registry = Arc::new(ArtifactRegistry::new(ContentStore::new(Arc::new(
        MemoryStore::new(),
    ))));
    let audit_store = Arc::new(MemoryAuditStore::new());
    let audit = Arc::new(AuditLog::open(audit_store.clone()).unwrap());
    let clock = Arc::new(ManualClock::default());
    let budgets = Arc::new(BudgetTracker::new());

    let builder = Guardian::builder(
        registry.clone(),
        RecordSigner::new(Ed25519KeyPair::generate()),
        audit.clone(),
        clock.clone(),
    )
    .graph(fixtures::single_rule_graph("safe_tool", "audit_report"))
    .budgets(budgets.clone());

    Harness {
        guardian: configure(builder).build(),
        registry,
        audit_store,
        audit,
        clock,
        budgets,
    }
}

fn stored_evidence(h: &Harness) -> ContentHash {
    h.registry.put(&fixtures::envelope("audit_report")).unwrap()
}

#[tokio::test]
async fn happy_pass_produces_signed_decision() {
    let h = harness(|b| b);
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-1", "safe_tool");
    request.evidence.push(evidence);

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();

    assert_eq!(decision.verdict, Verdict::Pass);
    assert!(decision.requirement_set_hash.as_deref().is_some_and(|s| !s.is_empty()));
    assert!(h.guardian.verify_decision(&decision));
    let expected_version =
        graph_content_hash(&fixtures::single_rule_graph("safe_tool", "audit_report")).unwrap();
    assert_eq!(decision.policy_version, expected_version);
    assert!(decision.policy_version.starts_with("sha256:"));

    // The decision is on the audit chain.
    let entries = h.audit.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "DECISION_MADE");
    assert_eq!(entries[0].target, decision.id);
}

#[tokio::test]
async fn unknown_action_fails_with_no_policy_defined() {
    let h = harness(|b| b);
    let request = fixtures::tool_request("req-2", "rogue_tool");

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();

    assert_eq!(decision.verdict, Verdict::Fail);
    assert_eq!(
        decision.reason.as_deref(),
        Some("no policy defined for action rogue_tool")
    );
    assert!(h.guardian.verify_decision(&decision));
}

#[tokio::test]
async fn budget_exhaustion_fails_closed() {
    let h = harness(|b| b);
    h.budgets
        .register(Budget::new("b", ResourceType::Requests, 1));
    let evidence = stored_evidence(&h);

    let mut first = fixtures::tool_request("req-3", "safe_tool");
    first.context["budget_id"] = "b".into();
    first.evidence.push(evidence.clone());
    let pass = h.guardian.evaluate_decision(&first).await.unwrap();
    assert_eq!(pass.verdict, Verdict::Pass);

    let mut second = fixtures::tool_request("req-4", "safe_tool");
    second.context["budget_id"] = "b".into();
    second.evidence.push(evidence);
    let fail = h.guardian.evaluate_decision(&second).await.unwrap();

    assert_eq!(fail.verdict, Verdict::Fail);
    assert!(fail.reason.as_deref().unwrap().contains("Budget Exceeded"));
    assert!(h.guardian.verify_decision(&fail));
}

#[tokio::test]
async fn temporal_interrupt_intervenes() {
    let h = harness(|b| {
        b.temporal_policy(TemporalPolicy::new(
            Duration::seconds(10),
            vec![ThresholdPolicy {
                level: ResponseLevel::Interrupt,
                max_rate: 15.0,
                sustained_for: Duration::zero(),
                cooldown_after: Duration::seconds(5),
            }],
        ))
    });
    let evidence = stored_evidence(&h);

    let mut last = None;
    for i in 0..151 {
        let mut request = fixtures::tool_request(&format!("req-t{i}"), "safe_tool");
        request.evidence.push(evidence.clone());
        last = Some(h.guardian.evaluate_decision(&request).await.unwrap());
    }
    let decision = last.unwrap();

    assert_eq!(decision.verdict, Verdict::Intervene);
    let intervention = decision.intervention.unwrap();
    assert_eq!(intervention.kind, InterventionKind::Interrupt);
    assert_eq!(intervention.reason_code, "TEMPORAL_INTERRUPT");
    assert_eq!(intervention.wait_ms, 30_000);
}

#[tokio::test]
async fn pdp_deny_binds_backend_provenance() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/data/helm/authz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": {"allow": false, "reason_code": "DENY_POLICY"}
        })))
        .mount(&server)
        .await;

    let pdp = Arc::new(OpaPdp::new(server.uri()));
    let h = harness(move |b| b.pdp(pdp));
    let request = fixtures::tool_request("req-5", "safe_tool");

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();

    assert_eq!(decision.verdict, Verdict::Fail);
    assert_eq!(decision.policy_backend.as_deref(), Some("opa"));
    assert!(decision.policy_decision_hash.as_deref().is_some_and(|s| s.starts_with("sha256:")));
    assert!(decision.reason.as_deref().unwrap().contains("DENY_POLICY"));
    assert!(h.guardian.verify_decision(&decision));
    assert_eq!(h.audit.entries().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_pdp_fails_closed_quickly() {
    use helm_api::pdp::PolicyDecisionPoint;

    // Nothing listens on port 9; connection is refused immediately.
    let pdp = OpaPdp::new("http://127.0.0.1:9");
    let request = helm_api::pdp::DecisionRequest {
        principal: "p".to_string(),
        action: "EXECUTE_TOOL".to_string(),
        resource: "safe_tool".to_string(),
        context: serde_json::json!({}),
        schema_hash: None,
        environment: None,
        timestamp: fixtures::fixed_time(),
    };
    let response = pdp.evaluate(Some(&request)).await;
    assert!(!response.allow);
    assert_eq!(response.reason_code, "DENY_OPA_UNREACHABLE");
}

#[tokio::test]
async fn audit_chain_tamper_detected_at_index() {
    let h = harness(|b| b);
    let evidence = stored_evidence(&h);
    for i in 0..3 {
        let mut request = fixtures::tool_request(&format!("req-a{i}"), "safe_tool");
        request.evidence.push(evidence.clone());
        h.guardian.evaluate_decision(&request).await.unwrap();
    }
    assert_eq!(h.audit.verify_chain().unwrap(), 3);

    h.audit_store.corrupt(1, |entry| {
        // Flip one character of the recorded details.
        let mut details = entry.details.clone();
        details.replace_range(0..1, "X");
        entry.details = details;
    });
    let err = h.audit.verify_chain().unwrap_err();
    assert!(matches!(err, AuditError::IntegrityFailureAtIndex(1)));
    assert_eq!(err.to_string(), "integrity failure at index 1");
}

#[tokio::test]
async fn intent_ttl_is_exactly_five_minutes() {
    let h = harness(|b| b);
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-6", "safe_tool");
    request.evidence.push(evidence);

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();
    let intent = h
        .guardian
        .issue_execution_intent(&decision, "safe_tool")
        .unwrap();

    assert_eq!(intent.id, format!("intent-{}", decision.id));
    assert_eq!(intent.expires_at - intent.issued_at, Duration::seconds(300));
    assert_eq!(intent.signer, "kernel");
    assert!(h.guardian.verify_intent(&intent));

    // Expiry is absolute; there is no renewal.
    h.clock.advance(Duration::seconds(301));
    assert!(intent.is_expired_at(h.clock.now()));
}

#[tokio::test]
async fn intent_refused_for_non_pass_decisions() {
    let h = harness(|b| b);
    let request = fixtures::tool_request("req-7", "rogue_tool");
    let decision = h.guardian.evaluate_decision(&request).await.unwrap();
    assert_eq!(decision.verdict, Verdict::Fail);

    let refused = h.guardian.issue_execution_intent(&decision, "rogue_tool");
    assert!(matches!(refused, Err(GuardianError::IntentRefused(_))));
}

#[tokio::test]
async fn missing_evidence_is_a_hard_error() {
    let h = harness(|b| b);
    let mut request = fixtures::tool_request("req-8", "safe_tool");
    request
        .evidence
        .push(ContentHash::from_digest([9u8; 32]));

    let err = h.guardian.evaluate_decision(&request).await.unwrap_err();
    assert!(matches!(err, GuardianError::MissingEvidence(_)));
    // No decision was produced, so nothing reached the audit chain.
    assert!(h.audit.entries().unwrap().is_empty());
}

#[tokio::test]
async fn replayed_requests_agree_on_everything_but_identity() {
    let h = harness(|b| b);
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-9", "safe_tool");
    request.evidence.push(evidence);

    let first = h.guardian.evaluate_decision(&request).await.unwrap();
    let second = h.guardian.evaluate_decision(&request).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.effect_digest, second.effect_digest);
    assert_eq!(first.policy_version, second.policy_version);
    assert_eq!(first.env_fingerprint, second.env_fingerprint);
    assert_eq!(first.requirement_set_hash, second.requirement_set_hash);
    assert_eq!(first.verdict, second.verdict);
}

#[tokio::test]
async fn receipts_record_execution_outcomes() {
    let h = harness(|b| b);
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-10", "safe_tool");
    request.evidence.push(evidence);

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();
    let intent = h
        .guardian
        .issue_execution_intent(&decision, "safe_tool")
        .unwrap();
    let receipt = h
        .guardian
        .issue_receipt(&intent, ReceiptOutcome::Success, None, None)
        .unwrap();

    assert_eq!(receipt.decision_id, decision.id);
    assert_eq!(receipt.outcome, ReceiptOutcome::Success);
    assert!(receipt.signature.is_some());
}

#[tokio::test]
async fn event_log_streams_the_pipeline() {
    let events = Arc::new(helm_ledger::EventLog::new());
    let events_for_builder = events.clone();
    let h = harness(move |b| b.events(events_for_builder));
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-12", "safe_tool");
    request.evidence.push(evidence);

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();
    h.guardian
        .issue_execution_intent(&decision, "safe_tool")
        .unwrap();

    let stream = events.events();
    assert_eq!(stream.len(), 2);
    assert_eq!(stream[0].event_type, "decision.recorded");
    assert_eq!(stream[0].sequence_number, 1);
    assert_eq!(stream[1].event_type, "intent.issued");
    assert_eq!(stream[1].sequence_number, 2);
    assert_eq!(stream[1].causation.as_deref(), Some(decision.id.as_str()));
}

#[tokio::test]
async fn opa_malformed_and_error_responses_fail_closed() {
    use helm_api::pdp::PolicyDecisionPoint;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let request = helm_api::pdp::DecisionRequest {
        principal: "p".to_string(),
        action: "EXECUTE_TOOL".to_string(),
        resource: "safe_tool".to_string(),
        context: serde_json::json!({}),
        schema_hash: None,
        environment: None,
        timestamp: fixtures::fixed_time(),
    };

    // Missing `result` member.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/data/helm/authz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    let response = OpaPdp::new(server.uri()).evaluate(Some(&request)).await;
    assert!(!response.allow);
    assert_eq!(response.reason_code, "DENY_MALFORMED_RESPONSE");

    // Non-OK backend status.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/data/helm/authz"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let response = OpaPdp::new(server.uri()).evaluate(Some(&request)).await;
    assert!(!response.allow);
    assert_eq!(response.reason_code, "DENY_BACKEND_STATUS");
}

#[tokio::test]
async fn cedar_dialect_maps_decisions() {
    use helm_api::pdp::PolicyDecisionPoint;
    use helm_guardian::pdp::CedarPdp;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let request = helm_api::pdp::DecisionRequest {
        principal: "p".to_string(),
        action: "EXECUTE_TOOL".to_string(),
        resource: "safe_tool".to_string(),
        context: serde_json::json!({}),
        schema_hash: None,
        environment: None,
        timestamp: fixtures::fixed_time(),
    };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decide"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "decision": "Deny",
            "diagnostics": {"reason": ["policy block-tool forbids safe_tool"]}
        })))
        .mount(&server)
        .await;

    let response = CedarPdp::new(server.uri()).evaluate(Some(&request)).await;
    assert!(!response.allow);
    assert_eq!(response.reason_code, "policy block-tool forbids safe_tool");
    assert!(response.policy_ref.starts_with("cedar:"));
}

#[tokio::test]
async fn shadow_mode_records_but_never_issues_intents() {
    let mut config = helm_types::config::KernelConfig::default();
    config.shadow_mode = true;
    let h = harness(move |b| b.config(config));
    let evidence = stored_evidence(&h);
    let mut request = fixtures::tool_request("req-11", "safe_tool");
    request.evidence.push(evidence);

    let decision = h.guardian.evaluate_decision(&request).await.unwrap();
    assert_eq!(decision.verdict, Verdict::Pass);
    assert!(matches!(
        h.guardian.issue_execution_intent(&decision, "safe_tool"),
        Err(GuardianError::IntentRefused(_))
    ));
}
