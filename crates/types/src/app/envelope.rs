// Path: crates/types/src/app/envelope.rs

use crate::error::CasError;
use crate::MAX_ARTIFACT_PAYLOAD_BYTES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated content hash: `"sha256:" + lowercase hex of 32 bytes`.
///
/// This is the key type of the content-addressed store and the form in which
/// every digest (effect, policy, decision) appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// The required prefix of every content hash.
    pub const PREFIX: &'static str = "sha256:";

    /// Parses and structurally validates a content hash string.
    pub fn parse(input: &str) -> Result<Self, CasError> {
        let hex_part = input
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| CasError::InvalidHash(input.to_string()))?;
        if hex_part.len() != 64 {
            return Err(CasError::InvalidHash(input.to_string()));
        }
        if !hex_part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(CasError::InvalidHash(input.to_string()));
        }
        Ok(Self(input.to_string()))
    }

    /// Builds a content hash from a raw 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(format!("{}{}", Self::PREFIX, hex::encode(digest)))
    }

    /// The full `sha256:`-prefixed string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 64-character hex part without the prefix.
    pub fn hex(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known artifact type identifiers. The set is open; these are the
/// types the kernel itself produces or requires.
pub mod artifact_types {
    /// An alert raised by a monitor.
    pub const ALERT: &str = "evidence/alert";
    /// A model prediction backing a proposed effect.
    pub const PREDICTION: &str = "evidence/prediction";
    /// An independent verification of another artifact.
    pub const VERIFICATION: &str = "evidence/verification";
    /// A visual capture (screenshot hash, rendered view).
    pub const VISUAL: &str = "evidence/visual";
    /// A draft policy under governance review.
    pub const POLICY_DRAFT: &str = "governance/policy-draft";
}

/// The atomic unit of evidence: a typed, signed envelope around an opaque
/// structured payload.
///
/// The canonical JCS bytes of the envelope are what the CAS hashes and what
/// signatures cover; there is no other serialization of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    /// The artifact type, e.g. `evidence/alert`.
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// The version of the payload schema.
    pub schema_version: String,
    /// The identity that produced this artifact.
    pub producer_id: String,
    /// Production time, UTC with millisecond precision.
    #[serde(with = "crate::codec::ts")]
    pub timestamp: DateTime<Utc>,
    /// The opaque structured content.
    pub payload: serde_json::Value,
    /// Hex-encoded signature over the canonical envelope bytes with the
    /// `signature` field excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// The key identity that produced `signature`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_key_id: Option<String>,
}

impl ArtifactEnvelope {
    /// Creates an unsigned envelope stamped at the given time.
    pub fn new(
        artifact_type: impl Into<String>,
        producer_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            schema_version: "1".to_string(),
            producer_id: producer_id.into(),
            timestamp,
            payload,
            signature: None,
            signature_key_id: None,
        }
    }

    /// Structural validity: non-empty type, non-empty payload, payload under
    /// the registry cap. The cap is measured over the payload's canonical
    /// serialization.
    pub fn validate(&self) -> Result<(), crate::error::RegistryError> {
        use crate::error::RegistryError;
        if self.artifact_type.trim().is_empty() {
            return Err(RegistryError::EmptyType);
        }
        if self.payload.is_null() {
            return Err(RegistryError::EmptyPayload);
        }
        if let Some(s) = self.payload.as_str() {
            if s.is_empty() {
                return Err(RegistryError::EmptyPayload);
            }
        }
        let size = crate::codec::jcs(&self.payload)?.len();
        if size > MAX_ARTIFACT_PAYLOAD_BYTES {
            return Err(RegistryError::PayloadTooLarge {
                size,
                max: MAX_ARTIFACT_PAYLOAD_BYTES,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_structural_validation() {
        let ok = format!("sha256:{}", "ab".repeat(32));
        assert!(ContentHash::parse(&ok).is_ok());

        let uppercase = format!("sha256:{}", "AB".repeat(32));
        let non_hex = format!("sha256:{}", "zz".repeat(32));
        let no_prefix = "ab".repeat(32);
        for bad in [
            "md5:abcd",
            "sha256:short",
            uppercase.as_str(),
            non_hex.as_str(),
            no_prefix.as_str(),
        ] {
            assert!(ContentHash::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn envelope_validation() {
        let now = Utc::now();
        let good = ArtifactEnvelope::new("evidence/alert", "sensor-1", now, json!({"ok": true}));
        assert!(good.validate().is_ok());

        let empty_type = ArtifactEnvelope::new("  ", "sensor-1", now, json!({"ok": true}));
        assert!(empty_type.validate().is_err());

        let empty_payload = ArtifactEnvelope::new("evidence/alert", "sensor-1", now, json!(null));
        assert!(empty_payload.validate().is_err());
    }

    #[test]
    fn envelope_round_trips_with_type_rename() {
        let env = ArtifactEnvelope::new(
            "evidence/alert",
            "sensor-1",
            Utc::now(),
            json!({"level": "high"}),
        );
        let raw = serde_json::to_value(&env).unwrap();
        assert_eq!(raw["type"], "evidence/alert");
        let back: ArtifactEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(back.artifact_type, env.artifact_type);
    }
}
