// Path: crates/crypto/src/sign/eddsa.rs
//! Ed25519 signing over `ed25519-dalek`.

use crate::error::CryptoError;
use ed25519_dalek::{Signer, Verifier};
use helm_api::crypto::{
    ArtifactVerifier, SerializableKey, Signature, SigningKey, SigningKeyPair, VerifyingKey,
};
use rand::rngs::OsRng;
use std::collections::HashMap;

/// Ed25519 key pair implementation.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

/// Ed25519 signature implementation.
pub struct Ed25519Signature(ed25519_dalek::Signature);

/// Ed25519 public key implementation.
#[derive(Clone)]
pub struct Ed25519PublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 private key implementation.
#[derive(Clone)]
pub struct Ed25519PrivateKey(ed25519_dalek::SigningKey);

impl Ed25519KeyPair {
    /// Generates a new key pair from the operating system's RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte seed".to_string()))?;
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    /// Signs a message and returns the signature as lowercase hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }
}

impl SigningKeyPair for Ed25519KeyPair {
    type PublicKey = Ed25519PublicKey;
    type PrivateKey = Ed25519PrivateKey;
    type Signature = Ed25519Signature;

    fn public_key(&self) -> Self::PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    fn private_key(&self) -> Self::PrivateKey {
        Ed25519PrivateKey(self.signing_key.clone())
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.signing_key.sign(message)))
    }
}

impl VerifyingKey for Ed25519PublicKey {
    type Signature = Ed25519Signature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

impl Ed25519PublicKey {
    /// Verifies a hex-encoded signature over a message.
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> Result<(), CryptoError> {
        let raw = hex::decode(signature_hex)
            .map_err(|e| CryptoError::Encoding(format!("signature hex: {e}")))?;
        let raw: [u8; 64] = raw
            .try_into()
            .map_err(|_| CryptoError::Encoding("expected 64-byte signature".to_string()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&raw);
        self.0
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

impl SerializableKey for Ed25519PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte public key".to_string()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Ed25519PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse public key: {e}")))
    }
}

impl SigningKey for Ed25519PrivateKey {
    type Signature = Ed25519Signature;

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.0.sign(message)))
    }
}

impl SerializableKey for Ed25519PrivateKey {
    fn to_bytes(&self) -> Vec<u8> {
        // Export just the seed (32 bytes).
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte seed".to_string()))?;
        Ok(Ed25519PrivateKey(ed25519_dalek::SigningKey::from_bytes(
            &seed,
        )))
    }
}

impl SerializableKey for Ed25519Signature {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::Encoding("expected 64-byte signature".to_string()))?;
        Ok(Ed25519Signature(ed25519_dalek::Signature::from_bytes(&raw)))
    }
}

impl Signature for Ed25519Signature {}

/// A key-id to verifying-key map for third-party signature verification.
///
/// The registry holds one of these as its `ArtifactVerifier`. Keys are
/// registered at construction; there is no dynamic key management inside the
/// kernel.
#[derive(Default, Clone)]
pub struct KeyRing {
    keys: HashMap<String, Ed25519PublicKey>,
}

impl KeyRing {
    /// An empty ring. Verification against it fails for every key id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verifying key under a key id.
    pub fn insert(&mut self, key_id: impl Into<String>, key: Ed25519PublicKey) {
        self.keys.insert(key_id.into(), key);
    }

    /// Whether a key id is known.
    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }
}

impl ArtifactVerifier for KeyRing {
    fn verify(
        &self,
        key_id: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), CryptoError> {
        let key = self
            .keys
            .get(key_id)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unknown key id {key_id:?}")))?;
        key.verify_hex(message, signature_hex)
    }
}
