// Path: crates/types/src/app/requirement.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a requirement set combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Logic {
    /// Every member must hold. The default when unspecified.
    #[default]
    And,
    /// At least one member must hold.
    Or,
    /// The negation of the AND of the members.
    Not,
}

/// One leaf requirement.
///
/// A requirement carries an expression, an artifact-type shortcut, or
/// neither, in which case it passes vacuously (open policy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Requirement {
    /// Optional identifier for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// A sandboxed boolean expression over the activation context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Shortcut: passes iff an artifact of this type is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl Requirement {
    /// A requirement satisfied by the presence of an artifact type.
    pub fn artifact(artifact_type: impl Into<String>) -> Self {
        Self {
            artifact_type: Some(artifact_type.into()),
            ..Self::default()
        }
    }

    /// A requirement satisfied by a boolean expression.
    pub fn expr(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::default()
        }
    }
}

/// A node of the proof requirement graph: leaves plus child sets combined
/// under one logic operator. An empty set passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet {
    /// Set identifier.
    pub id: String,
    /// The combining operator. Empty input deserializes to AND.
    #[serde(default)]
    pub logic: Logic,
    /// Leaf requirements.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Child sets, evaluated recursively.
    #[serde(default)]
    pub children: Vec<RequirementSet>,
}

impl RequirementSet {
    /// A set requiring all of the given leaves.
    pub fn all(id: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            id: id.into(),
            logic: Logic::And,
            requirements,
            children: Vec::new(),
        }
    }
}

/// The proof requirement graph: action id to root requirement set.
///
/// The canonical hash of `rules` is the kernel's `PolicyVersion`; it is bound
/// into every decision record. A `BTreeMap` keeps rule iteration (and hence
/// serialization) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// Rules keyed by action id.
    pub rules: BTreeMap<String, RequirementSet>,
}

impl Graph {
    /// Adds or replaces the rule for an action.
    pub fn insert(&mut self, action: impl Into<String>, rule: RequirementSet) {
        self.rules.insert(action.into(), rule);
    }

    /// Looks up the rule for an action.
    pub fn rule(&self, action: &str) -> Option<&RequirementSet> {
        self.rules.get(action)
    }
}
