// Path: crates/crypto/src/merkle.rs
//! The evidence Merkle tree: a deterministic commitment over the flattened
//! path→value pairs of a canonical JSON object, with inclusion proofs and
//! selective-disclosure views.
//!
//! Leaf and internal hashes carry distinct domain-separation tags; without
//! them an attacker could present an internal node as a leaf (or vice versa)
//! and forge inclusion across levels.

use crate::algorithms::hash::tagged_hash;
use helm_types::codec;
use helm_types::error::ProofError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain tag for leaf hashes.
pub const LEAF_TAG: &str = "helm:evidence:leaf:v1";
/// Domain tag for internal node hashes.
pub const NODE_TAG: &str = "helm:evidence:node:v1";

/// Which side a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The sibling is the left input of the parent hash.
    L,
    /// The sibling is the right input of the parent hash.
    R,
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Which side the sibling hash sits on.
    pub side: Side,
    /// The sibling hash, lowercase hex.
    pub sibling_hash: String,
}

/// A proof that one path/value leaf is included under a committed root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// The leaf's flattened path (JSON Pointer).
    pub leaf_path: String,
    /// The leaf hash, lowercase hex.
    pub leaf_hash: String,
    /// The authentication path, leaf level first.
    pub steps: Vec<ProofStep>,
    /// The root the proof anchors to, lowercase hex.
    pub root: String,
}

/// One committed leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleLeaf {
    /// The flattened path (JSON Pointer).
    pub path: String,
    /// The leaf's canonical value.
    pub value: Value,
    /// The leaf hash, lowercase hex.
    pub hash: String,
}

/// A Merkle tree over the flattened path→value pairs of an object.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    leaves: Vec<MerkleLeaf>,
    levels: Vec<Vec<[u8; 32]>>,
    root: String,
}

/// Computes a leaf hash: `SHA256(tag ‖ 0x00 ‖ path ‖ 0x00 ‖ canonical(value))`.
pub fn leaf_hash(path: &str, value: &Value) -> Result<[u8; 32], ProofError> {
    let canonical = codec::jcs(value)?;
    Ok(tagged_hash(LEAF_TAG, &[path.as_bytes(), &canonical]))
}

/// Computes an internal node hash: `SHA256(tag ‖ 0x00 ‖ left ‖ right)`.
///
/// Left and right are a single domain-separated part; their widths are fixed
/// so the concatenation is unambiguous.
pub fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let combined = [left.as_slice(), right.as_slice()].concat();
    tagged_hash(NODE_TAG, &[&combined])
}

impl MerkleTree {
    /// Builds a tree over the canonical form of `value`.
    ///
    /// The value is first canonicalized (nulls stripped, strings normalized)
    /// so producer and verifier commit to identical leaves, then flattened to
    /// scalar leaves whose paths are sorted lexicographically.
    pub fn build(value: &Value) -> Result<Self, ProofError> {
        let canonical_bytes = codec::jcs(value)?;
        let canonical: Value = serde_json::from_slice(&canonical_bytes)
            .map_err(|e| ProofError::Build(format!("canonical reparse: {e}")))?;

        let mut pairs = Vec::new();
        flatten(&canonical, "", &mut pairs);
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut leaves = Vec::with_capacity(pairs.len());
        let mut level = Vec::with_capacity(pairs.len());
        for (path, leaf_value) in pairs {
            let digest = leaf_hash(&path, &leaf_value)?;
            leaves.push(MerkleLeaf {
                path,
                value: leaf_value,
                hash: hex::encode(digest),
            });
            level.push(digest);
        }
        if level.is_empty() {
            // An empty object commits to the hash of an empty leaf set.
            level.push(tagged_hash(LEAF_TAG, &[b"", b""]));
        }

        let mut levels = vec![level];
        while levels.last().map(|level| level.len()).unwrap_or(0) > 1 {
            let mut next = Vec::new();
            let current = levels.last().cloned().unwrap_or_default();
            let mut iter = current.chunks(2);
            for pair in iter.by_ref() {
                match pair {
                    [left, right] => next.push(node_hash(left, right)),
                    // Odd level: duplicate the last node.
                    [only] => next.push(node_hash(only, only)),
                    _ => return Err(ProofError::Build("empty chunk".to_string())),
                }
            }
            levels.push(next);
        }

        let root = levels
            .last()
            .and_then(|l| l.first())
            .map(hex::encode)
            .ok_or_else(|| ProofError::Build("no root level".to_string()))?;

        Ok(Self {
            leaves,
            levels,
            root,
        })
    }

    /// The committed root, lowercase hex.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The committed leaves, path-sorted.
    pub fn leaves(&self) -> &[MerkleLeaf] {
        &self.leaves
    }

    /// Generates an inclusion proof for the leaf at `path`.
    pub fn generate_proof(&self, path: &str) -> Result<InclusionProof, ProofError> {
        let mut index = self
            .leaves
            .iter()
            .position(|leaf| leaf.path == path)
            .ok_or_else(|| ProofError::PathNotFound(path.to_string()))?;
        let leaf = self
            .leaves
            .get(index)
            .ok_or_else(|| ProofError::PathNotFound(path.to_string()))?;

        let mut steps = Vec::new();
        for level in self.levels.iter().take(self.levels.len().saturating_sub(1)) {
            let sibling_index = index ^ 1;
            // Odd levels duplicate their last node, so a missing sibling is
            // the node itself.
            let sibling = level
                .get(sibling_index)
                .or_else(|| level.get(index))
                .ok_or_else(|| ProofError::Build("missing sibling".to_string()))?;
            let side = if index % 2 == 0 { Side::R } else { Side::L };
            steps.push(ProofStep {
                side,
                sibling_hash: hex::encode(sibling),
            });
            index /= 2;
        }

        Ok(InclusionProof {
            leaf_path: leaf.path.clone(),
            leaf_hash: leaf.hash.clone(),
            steps,
            root: self.root.clone(),
        })
    }
}

/// Verifies an inclusion proof against a committed root.
///
/// Recomputes the path from `(leaf_hash, steps)` alone; the proof's own
/// `root` field is not trusted.
pub fn verify_proof(proof: &InclusionProof, committed_root: &str) -> bool {
    let Some(mut current) = decode_digest(&proof.leaf_hash) else {
        return false;
    };
    for step in &proof.steps {
        let Some(sibling) = decode_digest(&step.sibling_hash) else {
            return false;
        };
        current = match step.side {
            Side::L => node_hash(&sibling, &current),
            Side::R => node_hash(&current, &sibling),
        };
    }
    hex::encode(current) == committed_root
}

fn decode_digest(hex_str: &str) -> Option<[u8; 32]> {
    hex::decode(hex_str).ok()?.try_into().ok()
}

fn flatten(value: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(members) if !members.is_empty() => {
            for (key, member) in members {
                let path = format!("{prefix}/{}", escape_pointer(key));
                flatten(member, &path, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                let path = format!("{prefix}/{i}");
                flatten(item, &path, out);
            }
        }
        scalar_or_empty => {
            let path = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push((path, scalar_or_empty.clone()));
        }
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// What a view rule does with matching paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewAction {
    /// Reveal the path and its value.
    Disclose,
    /// Withhold the value; emit a sealed stub with a reason.
    Seal,
}

/// One selective-disclosure rule. `path_pattern` is an exact JSON Pointer or
/// a prefix ending in `*`. First matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRule {
    /// The pointer or `*`-suffixed prefix to match.
    pub path_pattern: String,
    /// Disclose or seal.
    pub action: ViewAction,
    /// Why the path is sealed, surfaced in the stub.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ViewRule {
    fn matches(&self, path: &str) -> bool {
        match self.path_pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == self.path_pattern,
        }
    }
}

/// An ordered rule list producing selective-disclosure views.
/// Unmatched paths are sealed (fail-closed).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewPolicy {
    /// The rules, evaluated first-match-wins.
    pub rules: Vec<ViewRule>,
}

/// A sealed path stub: present in the view, value withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedStub {
    /// The withheld path.
    pub path: String,
    /// Why it is withheld.
    pub reason: String,
}

/// A selective-disclosure view committed to the same root as the full tree.
///
/// A verifier checks inclusion of each disclosed pair against `root` without
/// ever seeing sealed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosedView {
    /// The committed root of the full tree.
    pub root: String,
    /// Disclosed path/value pairs with their inclusion proofs.
    pub disclosed: Vec<(String, Value, InclusionProof)>,
    /// Sealed stubs.
    pub sealed: Vec<SealedStub>,
}

/// Verifies a selective-disclosure view: every disclosed pair must carry a
/// valid inclusion proof for its own path and value, anchored to the view's
/// root. Sealed stubs carry no provable content and are ignored.
pub fn verify_view(view: &DisclosedView) -> bool {
    view.disclosed.iter().all(|(path, value, proof)| {
        if proof.leaf_path != *path {
            return false;
        }
        // The disclosed value must be the one the leaf hash commits to.
        match leaf_hash(path, value) {
            Ok(expected) => {
                hex::encode(expected) == proof.leaf_hash && verify_proof(proof, &view.root)
            }
            Err(_) => false,
        }
    })
}

impl ViewPolicy {
    /// Applies the policy over an object, committing to its full tree.
    pub fn apply(&self, value: &Value) -> Result<DisclosedView, ProofError> {
        let tree = MerkleTree::build(value)?;
        let mut disclosed = Vec::new();
        let mut sealed = Vec::new();

        for leaf in tree.leaves() {
            let rule = self.rules.iter().find(|r| r.matches(&leaf.path));
            match rule.map(|r| r.action) {
                Some(ViewAction::Disclose) => {
                    let proof = tree.generate_proof(&leaf.path)?;
                    disclosed.push((leaf.path.clone(), leaf.value.clone(), proof));
                }
                Some(ViewAction::Seal) => sealed.push(SealedStub {
                    path: leaf.path.clone(),
                    reason: rule
                        .and_then(|r| r.reason.clone())
                        .unwrap_or_else(|| "sealed by policy".to_string()),
                }),
                None => sealed.push(SealedStub {
                    path: leaf.path.clone(),
                    reason: "undisclosed".to_string(),
                }),
            }
        }

        Ok(DisclosedView {
            root: tree.root().to_string(),
            disclosed,
            sealed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "alert": {"severity": "high", "source": "sensor-7"},
            "metrics": [1, 2, 3],
            "note": "checked"
        })
    }

    #[test]
    fn every_path_round_trips() {
        let tree = MerkleTree::build(&sample()).unwrap();
        for leaf in tree.leaves() {
            let proof = tree.generate_proof(&leaf.path).unwrap();
            assert!(verify_proof(&proof, tree.root()), "{}", leaf.path);
        }
    }

    #[test]
    fn flipping_leaf_hash_breaks_proof() {
        let tree = MerkleTree::build(&sample()).unwrap();
        let mut proof = tree.generate_proof("/note").unwrap();
        let mut chars: Vec<char> = proof.leaf_hash.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        proof.leaf_hash = chars.into_iter().collect();
        assert!(!verify_proof(&proof, tree.root()));
    }

    #[test]
    fn flipping_any_step_breaks_proof() {
        let tree = MerkleTree::build(&sample()).unwrap();
        let base = tree.generate_proof("/alert/severity").unwrap();
        for i in 0..base.steps.len() {
            let mut proof = base.clone();
            let mut chars: Vec<char> = proof.steps[i].sibling_hash.chars().collect();
            chars[3] = if chars[3] == 'a' { 'b' } else { 'a' };
            proof.steps[i].sibling_hash = chars.into_iter().collect();
            assert!(!verify_proof(&proof, tree.root()), "step {i}");
        }
    }

    #[test]
    fn root_is_order_independent() {
        let reordered = json!({
            "note": "checked",
            "metrics": [1, 2, 3],
            "alert": {"source": "sensor-7", "severity": "high"}
        });
        let a = MerkleTree::build(&sample()).unwrap();
        let b = MerkleTree::build(&reordered).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn leaf_and_node_domains_do_not_collide() {
        let leaf = leaf_hash("/x", &json!(1)).unwrap();
        let fake_node = node_hash(&leaf, &leaf);
        let as_leaf = leaf_hash("/x", &json!(hex::encode(fake_node))).unwrap();
        assert_ne!(fake_node, as_leaf);
    }

    #[test]
    fn unknown_path_is_an_error() {
        let tree = MerkleTree::build(&sample()).unwrap();
        assert!(matches!(
            tree.generate_proof("/missing"),
            Err(ProofError::PathNotFound(_))
        ));
    }

    #[test]
    fn selective_disclosure_commits_to_same_root() {
        let policy = ViewPolicy {
            rules: vec![
                ViewRule {
                    path_pattern: "/alert/*".to_string(),
                    action: ViewAction::Disclose,
                    reason: None,
                },
                ViewRule {
                    path_pattern: "/note".to_string(),
                    action: ViewAction::Seal,
                    reason: Some("operator note is private".to_string()),
                },
            ],
        };
        let tree = MerkleTree::build(&sample()).unwrap();
        let view = policy.apply(&sample()).unwrap();

        assert_eq!(view.root, tree.root());
        assert_eq!(view.disclosed.len(), 2);
        for (path, _, proof) in &view.disclosed {
            assert!(verify_proof(proof, &view.root), "{path}");
        }
        // Sealed paths carry reasons but no values.
        assert!(view.sealed.iter().any(|s| s.path == "/note"
            && s.reason == "operator note is private"));
        // Unmatched paths are sealed by default.
        assert!(view
            .sealed
            .iter()
            .any(|s| s.path.starts_with("/metrics") && s.reason == "undisclosed"));
    }

    #[test]
    fn view_verification_rejects_substituted_values() {
        let policy = ViewPolicy {
            rules: vec![ViewRule {
                path_pattern: "/alert/*".to_string(),
                action: ViewAction::Disclose,
                reason: None,
            }],
        };
        let mut view = policy.apply(&sample()).unwrap();
        assert!(verify_view(&view));

        // Swapping a disclosed value without reproving breaks the view.
        view.disclosed[0].1 = json!("forged");
        assert!(!verify_view(&view));
    }
}
