// Path: crates/storage/src/registry.rs

use crate::ContentStore;
use helm_api::crypto::ArtifactVerifier;
use helm_types::app::{ArtifactEnvelope, ContentHash};
use helm_types::codec;
use helm_types::error::{CasError, RegistryError};
use std::sync::Arc;

/// The artifact registry: envelope validation, canonical marshalling, and
/// fail-closed signature verification over the content-addressed store.
pub struct ArtifactRegistry {
    cas: ContentStore,
    verifier: Option<Arc<dyn ArtifactVerifier>>,
}

impl ArtifactRegistry {
    /// A registry without a verifier. `verify` reports every artifact
    /// invalid until one is configured.
    pub fn new(cas: ContentStore) -> Self {
        Self {
            cas,
            verifier: None,
        }
    }

    /// A registry with a configured signature verifier.
    pub fn with_verifier(cas: ContentStore, verifier: Arc<dyn ArtifactVerifier>) -> Self {
        Self {
            cas,
            verifier: Some(verifier),
        }
    }

    /// The canonical bytes an envelope signature covers: the envelope with
    /// its `signature` member excluded.
    pub fn signing_bytes(envelope: &ArtifactEnvelope) -> Result<Vec<u8>, RegistryError> {
        let mut unsigned = envelope.clone();
        unsigned.signature = None;
        Ok(codec::canonical_bytes(&unsigned)?)
    }

    /// Validates and stores an envelope, returning its content hash.
    pub fn put(&self, envelope: &ArtifactEnvelope) -> Result<ContentHash, RegistryError> {
        envelope.validate()?;
        let canonical = codec::canonical_bytes(envelope)?;
        let hash = self.cas.store(&canonical)?;
        tracing::debug!(
            target: "registry",
            artifact_type = %envelope.artifact_type,
            hash = %hash,
            "artifact stored"
        );
        Ok(hash)
    }

    /// Fetches and decodes the envelope stored under a hash.
    pub fn get(&self, hash: &str) -> Result<ArtifactEnvelope, RegistryError> {
        let bytes = match self.cas.get(hash) {
            Ok(bytes) => bytes,
            Err(CasError::NotFound(h)) => return Err(RegistryError::NotFound(h)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| RegistryError::Corrupt(e.to_string()))
    }

    /// Verifies the artifact stored under a hash.
    ///
    /// Returns `(valid, reasons)`. The check is fail-closed: with no verifier
    /// configured, nothing is valid; a missing signature or key id is
    /// invalid; a cryptographic failure is invalid with its reason.
    pub fn verify(&self, hash: &str) -> Result<(bool, Vec<String>), RegistryError> {
        let envelope = self.get(hash)?;

        // Without a verifier nothing can be validated; report only that.
        let Some(verifier) = self.verifier.as_deref() else {
            return Ok((
                false,
                vec!["verifier not configured (fail-closed)".to_string()],
            ));
        };

        let mut reasons = Vec::new();
        if envelope.artifact_type.trim().is_empty() {
            reasons.push("empty artifact type".to_string());
        }
        match (&envelope.signature, &envelope.signature_key_id) {
            (Some(signature), Some(key_id)) => {
                let message = Self::signing_bytes(&envelope)?;
                if let Err(e) = verifier.verify(key_id, &message, signature) {
                    reasons.push(format!("signature verification failed: {e}"));
                }
            }
            (None, _) => reasons.push("missing signature".to_string()),
            (_, None) => reasons.push("missing signature key id".to_string()),
        }

        Ok((reasons.is_empty(), reasons))
    }
}
