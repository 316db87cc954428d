// Path: crates/test_utils/src/fixtures.rs

use chrono::{DateTime, TimeZone, Utc};
use helm_types::app::{
    ArtifactEnvelope, EffectRequest, Graph, Requirement, RequirementSet,
};
use serde_json::json;

/// The fixed instant most fixtures are stamped with.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// An unsigned envelope of the given type with a trivial payload.
pub fn envelope(artifact_type: &str) -> ArtifactEnvelope {
    ArtifactEnvelope::new(
        artifact_type,
        "producer-1",
        fixed_time(),
        json!({"ok": true}),
    )
}

/// A one-rule graph: `action` requires the presence of `artifact_type`.
pub fn single_rule_graph(action: &str, artifact_type: &str) -> Graph {
    let mut graph = Graph::default();
    graph.insert(
        action,
        RequirementSet::all(
            format!("{action}-root"),
            vec![Requirement::artifact(artifact_type)],
        ),
    );
    graph
}

/// An effect request for `EXECUTE_TOOL` against the named tool.
pub fn tool_request(id: &str, tool: &str) -> EffectRequest {
    EffectRequest {
        id: id.to_string(),
        principal: "p".to_string(),
        action: "EXECUTE_TOOL".to_string(),
        resource: tool.to_string(),
        context: json!({"tool_name": tool}),
        evidence: Vec::new(),
    }
}
