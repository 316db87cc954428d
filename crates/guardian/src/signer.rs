// Path: crates/guardian/src/signer.rs
//! Ed25519 signing of kernel records over canonical bytes.
//!
//! Every record signs the same way: canonicalize with the `signature` member
//! excluded, sign the bytes, store the hex. Verification inverts this, so a
//! single byte of drift anywhere in the record breaks the signature.

use helm_api::crypto::SigningKeyPair;
use helm_crypto::sign::{Ed25519KeyPair, Ed25519PublicKey, KeyRing};
use helm_types::app::{AuthorizedExecutionIntent, DecisionRecord, ExecutionReceipt};
use helm_types::codec;
use helm_types::error::SignError;
use serde::Serialize;

/// The kernel's record signer. Owns one long-lived key identity; third-party
/// signatures verify through the configured key ring.
pub struct RecordSigner {
    keypair: Ed25519KeyPair,
    signer_id: String,
    ring: KeyRing,
}

impl RecordSigner {
    /// The kernel's signer identity.
    pub const KERNEL_SIGNER: &'static str = "kernel";

    /// Creates a signer with a fresh key and an empty ring.
    pub fn new(keypair: Ed25519KeyPair) -> Self {
        Self {
            keypair,
            signer_id: Self::KERNEL_SIGNER.to_string(),
            ring: KeyRing::new(),
        }
    }

    /// Creates a signer with a third-party verification ring.
    pub fn with_ring(keypair: Ed25519KeyPair, ring: KeyRing) -> Self {
        Self {
            keypair,
            signer_id: Self::KERNEL_SIGNER.to_string(),
            ring,
        }
    }

    /// The signer identity written into intents and receipts.
    pub fn signer_id(&self) -> &str {
        &self.signer_id
    }

    /// The public half of the signing key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    fn canonical_unsigned<T, F>(record: &T, strip: F) -> Result<Vec<u8>, SignError>
    where
        T: Serialize + Clone,
        F: FnOnce(&mut T),
    {
        let mut unsigned = record.clone();
        strip(&mut unsigned);
        Ok(codec::canonical_bytes(&unsigned)?)
    }

    fn sign_bytes(&self, message: &[u8]) -> String {
        self.keypair.sign_hex(message)
    }

    fn verify_bytes(&self, message: &[u8], signature: Option<&str>) -> Result<(), SignError> {
        let signature = signature.ok_or(SignError::MissingSignature)?;
        self.keypair
            .public_key()
            .verify_hex(message, signature)
            .map_err(SignError::from)
    }

    /// Signs a decision record in place.
    pub fn sign_decision(&self, decision: &mut DecisionRecord) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(decision, |d| d.signature = None)?;
        decision.signature = Some(self.sign_bytes(&message));
        Ok(())
    }

    /// Verifies a decision record's signature.
    pub fn verify_decision(&self, decision: &DecisionRecord) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(decision, |d| d.signature = None)?;
        self.verify_bytes(&message, decision.signature.as_deref())
    }

    /// Signs an execution intent in place.
    pub fn sign_intent(&self, intent: &mut AuthorizedExecutionIntent) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(intent, |i| i.signature = None)?;
        intent.signature = Some(self.sign_bytes(&message));
        Ok(())
    }

    /// Verifies an execution intent's signature.
    pub fn verify_intent(&self, intent: &AuthorizedExecutionIntent) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(intent, |i| i.signature = None)?;
        self.verify_bytes(&message, intent.signature.as_deref())
    }

    /// Signs an execution receipt in place.
    pub fn sign_receipt(&self, receipt: &mut ExecutionReceipt) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(receipt, |r| r.signature = None)?;
        receipt.signature = Some(self.sign_bytes(&message));
        Ok(())
    }

    /// Verifies an execution receipt's signature.
    pub fn verify_receipt(&self, receipt: &ExecutionReceipt) -> Result<(), SignError> {
        let message = Self::canonical_unsigned(receipt, |r| r.signature = None)?;
        self.verify_bytes(&message, receipt.signature.as_deref())
    }

    /// Verifies a third-party signature through the key ring.
    pub fn verify_third_party(
        &self,
        key_id: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), SignError> {
        use helm_api::crypto::ArtifactVerifier;
        if !self.ring.contains(key_id) {
            return Err(SignError::UnknownSigner(key_id.to_string()));
        }
        self.ring
            .verify(key_id, message, signature_hex)
            .map_err(SignError::from)
    }
}
