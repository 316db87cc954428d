// Path: crates/guardian/src/prg/mod.rs
//! The proof requirement graph: recursive AND/OR/NOT requirement trees
//! evaluated against artifact context.

pub mod expr;

use expr::{EvalLimits, ExprCache};
use helm_crypto::algorithms::hash::content_hash_record;
use helm_types::app::{ArtifactEnvelope, Graph, Logic, RequirementSet};
use helm_types::error::PolicyError;
use serde_json::Value;

/// The canonical content hash of a graph's rules. This is the kernel's
/// `PolicyVersion`; it is recomputed from the rules on demand and never
/// cached across edits.
pub fn graph_content_hash(graph: &Graph) -> Result<String, PolicyError> {
    Ok(content_hash_record(&graph.rules)?.to_string())
}

/// The canonical content hash of one requirement set, bound into PASS
/// decisions as `requirement_set_hash`.
pub fn requirement_set_hash(set: &RequirementSet) -> Result<String, PolicyError> {
    Ok(content_hash_record(set)?.to_string())
}

/// The requirement-set evaluator with its per-expression compile cache.
pub struct PolicyEngine {
    cache: ExprCache,
}

impl PolicyEngine {
    /// An engine with default expression budgets.
    pub fn new() -> Self {
        Self {
            cache: ExprCache::default(),
        }
    }

    /// An engine with host-configured expression budgets.
    pub fn with_limits(limits: EvalLimits) -> Self {
        Self {
            cache: ExprCache::new(limits),
        }
    }

    /// Evaluates a requirement set against the activation context and the
    /// supplied artifacts.
    ///
    /// Leaves evaluate first (expression, then artifact-type shortcut, then
    /// vacuous pass), child sets recurse, and the set's logic combines the
    /// results: AND requires all, OR requires any, NOT negates the AND. An
    /// empty set passes. Any expression failure aborts the whole evaluation.
    pub fn evaluate_requirement_set(
        &self,
        set: &RequirementSet,
        activation: &Value,
        artifacts: &[ArtifactEnvelope],
    ) -> Result<bool, PolicyError> {
        let mut results = Vec::with_capacity(set.requirements.len() + set.children.len());

        for requirement in &set.requirements {
            let satisfied = if let Some(expression) = &requirement.expression {
                let compiled = self.cache.get_or_compile(expression)?;
                compiled.eval_bool(activation)?
            } else if let Some(artifact_type) = &requirement.artifact_type {
                artifacts
                    .iter()
                    .any(|artifact| artifact.artifact_type == *artifact_type)
            } else {
                // Neither an expression nor a type: open policy, passes.
                true
            };
            results.push(satisfied);
        }

        for child in &set.children {
            results.push(self.evaluate_requirement_set(child, activation, artifacts)?);
        }

        if results.is_empty() {
            return Ok(true);
        }
        let all = results.iter().all(|r| *r);
        Ok(match set.logic {
            Logic::And => all,
            Logic::Or => results.iter().any(|r| *r),
            Logic::Not => !all,
        })
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use helm_types::app::Requirement;
    use serde_json::json;

    fn artifact(artifact_type: &str) -> ArtifactEnvelope {
        ArtifactEnvelope::new(
            artifact_type,
            "producer-1",
            Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
            json!({"ok": true}),
        )
    }

    fn activation() -> Value {
        json!({"input": {"count": 3}, "action": "EXECUTE_TOOL"})
    }

    #[test]
    fn artifact_shortcut_checks_presence() {
        let engine = PolicyEngine::new();
        let set = RequirementSet::all("root", vec![Requirement::artifact("audit_report")]);

        let present = [artifact("audit_report")];
        assert!(engine
            .evaluate_requirement_set(&set, &activation(), &present)
            .unwrap());
        assert!(!engine
            .evaluate_requirement_set(&set, &activation(), &[artifact("evidence/alert")])
            .unwrap());
    }

    #[test]
    fn empty_set_passes() {
        let engine = PolicyEngine::new();
        let set = RequirementSet::all("root", vec![]);
        assert!(engine
            .evaluate_requirement_set(&set, &activation(), &[])
            .unwrap());
    }

    #[test]
    fn vacuous_leaf_passes() {
        let engine = PolicyEngine::new();
        let set = RequirementSet::all("root", vec![Requirement::default()]);
        assert!(engine
            .evaluate_requirement_set(&set, &activation(), &[])
            .unwrap());
    }

    #[test]
    fn logic_operators_combine_members() {
        let engine = PolicyEngine::new();
        let yes = Requirement::expr("input.count == 3");
        let no = Requirement::expr("input.count == 4");

        let and_set = RequirementSet {
            id: "and".into(),
            logic: Logic::And,
            requirements: vec![yes.clone(), no.clone()],
            children: vec![],
        };
        assert!(!engine
            .evaluate_requirement_set(&and_set, &activation(), &[])
            .unwrap());

        let or_set = RequirementSet {
            id: "or".into(),
            logic: Logic::Or,
            requirements: vec![yes.clone(), no.clone()],
            children: vec![],
        };
        assert!(engine
            .evaluate_requirement_set(&or_set, &activation(), &[])
            .unwrap());

        let not_set = RequirementSet {
            id: "not".into(),
            logic: Logic::Not,
            requirements: vec![yes, no],
            children: vec![],
        };
        // NOT of (true AND false) = true.
        assert!(engine
            .evaluate_requirement_set(&not_set, &activation(), &[])
            .unwrap());
    }

    #[test]
    fn children_recurse() {
        let engine = PolicyEngine::new();
        let child = RequirementSet::all("child", vec![Requirement::artifact("audit_report")]);
        let root = RequirementSet {
            id: "root".into(),
            logic: Logic::And,
            requirements: vec![Requirement::expr("input.count >= 1")],
            children: vec![child],
        };
        assert!(engine
            .evaluate_requirement_set(&root, &activation(), &[artifact("audit_report")])
            .unwrap());
        assert!(!engine
            .evaluate_requirement_set(&root, &activation(), &[])
            .unwrap());
    }

    #[test]
    fn expression_failure_aborts_evaluation() {
        let engine = PolicyEngine::new();
        let set = RequirementSet::all("root", vec![Requirement::expr("1 +")]);
        assert!(engine
            .evaluate_requirement_set(&set, &activation(), &[])
            .is_err());
    }

    #[test]
    fn graph_hash_tracks_rule_edits() {
        let mut graph = Graph::default();
        graph.insert(
            "safe_tool",
            RequirementSet::all("r", vec![Requirement::artifact("audit_report")]),
        );
        let before = graph_content_hash(&graph).unwrap();

        graph.insert(
            "other_tool",
            RequirementSet::all("r2", vec![Requirement::default()]),
        );
        let after = graph_content_hash(&graph).unwrap();
        assert_ne!(before, after);
        assert!(before.starts_with("sha256:"));
    }
}
