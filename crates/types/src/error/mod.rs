// Path: crates/types/src/error/mod.rs
//! Core error types for the HELM Kernel.

use thiserror::Error;

pub mod ir;

pub use ir::{CauseEntry, Classification, ErrorIr};

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// A trait for classifying an error under the kernel's retry taxonomy.
pub trait Classify {
    /// Returns the retry classification for this error.
    fn classification(&self) -> Classification;
}

/// Errors raised by the canonical codec (CSNF violations).
///
/// These are never retryable: the same input will always violate the same rule.
#[derive(Debug, Error)]
pub enum CanonError {
    /// A non-integer number was encountered in strict canonical mode.
    #[error("CSNF violation: non-integer number rejected: {0}")]
    FloatRejected(String),
    /// A string failed the decimal-string profile.
    #[error("CSNF violation: not a valid decimal string: {0:?}")]
    InvalidDecimalString(String),
    /// Canonical output was not valid UTF-8.
    #[error("CSNF violation: canonical output was not valid UTF-8")]
    InvalidUtf8,
    /// Two object keys collapsed to the same NFC form.
    #[error("CSNF violation: duplicate object key after normalization: {0:?}")]
    DuplicateKey(String),
    /// A timestamp did not parse as RFC 3339.
    #[error("CSNF violation: malformed timestamp: {0}")]
    MalformedTimestamp(String),
    /// A payload exceeded the configured size cap.
    #[error("CSNF violation: payload of {size} bytes exceeds cap of {max} bytes")]
    Oversize {
        /// Observed payload size in bytes.
        size: usize,
        /// The enforced cap in bytes.
        max: usize,
    },
    /// The value could not be bridged into the canonical value model.
    #[error("canonical serialization failed: {0}")]
    Serialize(String),
}

impl ErrorCode for CanonError {
    fn code(&self) -> &'static str {
        match self {
            Self::FloatRejected(_) => "CSNF_FLOAT_REJECTED",
            Self::InvalidDecimalString(_) => "CSNF_INVALID_DECIMAL",
            Self::InvalidUtf8 => "CSNF_INVALID_UTF8",
            Self::DuplicateKey(_) => "CSNF_DUPLICATE_KEY",
            Self::MalformedTimestamp(_) => "CSNF_MALFORMED_TIMESTAMP",
            Self::Oversize { .. } => "CSNF_OVERSIZE",
            Self::Serialize(_) => "CSNF_SERIALIZE_FAILED",
        }
    }
}

impl Classify for CanonError {
    fn classification(&self) -> Classification {
        Classification::NonRetryable
    }
}

/// Errors raised by the content-addressed store and its backends.
#[derive(Debug, Error)]
pub enum CasError {
    /// The supplied hash string did not match `sha256:` + 64 lowercase hex.
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),
    /// No blob exists under the requested hash.
    #[error("content not found: {0}")]
    NotFound(String),
    /// The backend failed; typically transient I/O.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// The operation was canceled by the caller's context.
    #[error("storage operation canceled")]
    Canceled,
}

impl ErrorCode for CasError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidHash(_) => "CAS_INVALID_HASH",
            Self::NotFound(_) => "CAS_NOT_FOUND",
            Self::Backend(_) => "CAS_BACKEND_ERROR",
            Self::Canceled => "CAS_CANCELED",
        }
    }
}

impl Classify for CasError {
    fn classification(&self) -> Classification {
        match self {
            Self::Backend(_) => Classification::Retryable,
            Self::Canceled => Classification::IdempotentSafe,
            _ => Classification::NonRetryable,
        }
    }
}

/// Errors raised by the artifact registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The envelope carried an empty artifact type.
    #[error("artifact envelope has empty type")]
    EmptyType,
    /// The envelope carried an empty payload.
    #[error("artifact envelope has empty payload")]
    EmptyPayload,
    /// The payload exceeded the registry cap.
    #[error("artifact payload of {size} bytes exceeds cap of {max} bytes")]
    PayloadTooLarge {
        /// Observed payload size in bytes.
        size: usize,
        /// The enforced cap in bytes.
        max: usize,
    },
    /// Stored bytes did not parse back into an envelope.
    #[error("stored artifact is corrupt: {0}")]
    Corrupt(String),
    /// No artifact exists under the requested hash.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// The envelope failed canonicalization.
    #[error(transparent)]
    Canon(#[from] CanonError),
    /// The underlying store failed.
    #[error(transparent)]
    Cas(#[from] CasError),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyType => "REG_EMPTY_TYPE",
            Self::EmptyPayload => "REG_EMPTY_PAYLOAD",
            Self::PayloadTooLarge { .. } => "REG_PAYLOAD_TOO_LARGE",
            Self::Corrupt(_) => "REG_CORRUPT",
            Self::NotFound(_) => "REG_NOT_FOUND",
            Self::Canon(e) => e.code(),
            Self::Cas(e) => e.code(),
        }
    }
}

impl Classify for RegistryError {
    fn classification(&self) -> Classification {
        match self {
            Self::Cas(e) => e.classification(),
            _ => Classification::NonRetryable,
        }
    }
}

/// Errors raised by cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// A signature failed cryptographic verification.
    #[error("invalid signature")]
    InvalidSignature,
    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),
    /// Encoded material (hex) could not be decoded.
    #[error("malformed encoding: {0}")]
    Encoding(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature => "CRYPTO_INVALID_SIGNATURE",
            Self::SigningFailed(_) => "CRYPTO_SIGNING_FAILED",
            Self::Encoding(_) => "CRYPTO_MALFORMED_ENCODING",
        }
    }
}

/// Errors raised by Merkle tree construction and proof verification.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The requested path does not exist in the tree.
    #[error("path not found in tree: {0}")]
    PathNotFound(String),
    /// The proof did not recompute to the committed root.
    #[error("inclusion proof did not anchor to the committed root")]
    DidNotAnchor,
    /// The tree could not be built over the supplied object.
    #[error("merkle build failed: {0}")]
    Build(String),
    /// The object under commitment failed canonicalization.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

impl ErrorCode for ProofError {
    fn code(&self) -> &'static str {
        match self {
            Self::PathNotFound(_) => "MERKLE_PATH_NOT_FOUND",
            Self::DidNotAnchor => "MERKLE_PROOF_NO_ANCHOR",
            Self::Build(_) => "MERKLE_BUILD_FAILED",
            Self::Canon(e) => e.code(),
        }
    }
}

/// Errors raised by the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The append could not be persisted. This is fatal for decision flows.
    #[error("audit append failed: {0}")]
    AppendFailed(String),
    /// An entry's recomputed hash did not match its recorded hash.
    #[error("integrity failure at index {0}")]
    IntegrityFailureAtIndex(usize),
    /// An entry's `previous_hash` did not match its predecessor's hash.
    #[error("chain broken at index {0}")]
    ChainBrokenAtIndex(usize),
    /// The backing store failed.
    #[error("audit backend error: {0}")]
    Backend(String),
    /// A stored entry failed canonicalization during recompute.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

impl ErrorCode for AuditError {
    fn code(&self) -> &'static str {
        match self {
            Self::AppendFailed(_) => "AUDIT_APPEND_FAILED",
            Self::IntegrityFailureAtIndex(_) => "AUDIT_INTEGRITY_FAILURE",
            Self::ChainBrokenAtIndex(_) => "AUDIT_CHAIN_BROKEN",
            Self::Backend(_) => "AUDIT_BACKEND_ERROR",
            Self::Canon(e) => e.code(),
        }
    }
}

/// Errors raised by the obligation ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No obligation exists under the requested id (within the active tenant).
    #[error("obligation not found: {0}")]
    NotFound(String),
    /// The lease compare-and-update matched zero rows.
    #[error("obligation is leased by another worker")]
    LockedByAnotherWorker,
    /// No `PENDING` obligation was available for dispatch.
    #[error("no pending obligations")]
    NoPendingObligations,
    /// The requested lifecycle transition is not legal.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
    /// The caller supplied no tenant context.
    #[error("tenant context is required")]
    MissingTenant,
    /// The backing store failed.
    #[error("ledger backend error: {0}")]
    Backend(String),
    /// The operation was canceled by the caller's context.
    #[error("ledger operation canceled")]
    Canceled,
    /// A row failed canonicalization while computing its chain link.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

impl ErrorCode for LedgerError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "LEDGER_NOT_FOUND",
            Self::LockedByAnotherWorker => "LEDGER_LOCKED_BY_ANOTHER_WORKER",
            Self::NoPendingObligations => "LEDGER_NO_PENDING",
            Self::InvalidTransition { .. } => "LEDGER_INVALID_TRANSITION",
            Self::MissingTenant => "LEDGER_MISSING_TENANT",
            Self::Backend(_) => "LEDGER_BACKEND_ERROR",
            Self::Canceled => "LEDGER_CANCELED",
            Self::Canon(e) => e.code(),
        }
    }
}

impl Classify for LedgerError {
    fn classification(&self) -> Classification {
        match self {
            Self::LockedByAnotherWorker | Self::NoPendingObligations => {
                Classification::IdempotentSafe
            }
            Self::Backend(_) => Classification::Retryable,
            _ => Classification::NonRetryable,
        }
    }
}

/// Errors raised during requirement-graph evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// No rule is defined for the resolved action id.
    #[error("no policy defined for action {0}")]
    NoRuleForAction(String),
    /// An expression failed to compile.
    #[error("expression compile error: {0}")]
    Compile(String),
    /// An expression failed during evaluation.
    #[error("expression eval error: {0}")]
    Eval(String),
    /// An expression produced a non-boolean result.
    #[error("expression result was not boolean")]
    NotBoolean,
    /// The expression exceeded the configured nesting-depth budget.
    #[error("expression nesting depth exceeds budget of {0}")]
    DepthExceeded(usize),
    /// The expression exceeded the configured node-cost budget.
    #[error("expression cost exceeds budget of {0}")]
    CostExceeded(usize),
    /// The graph failed canonicalization while computing its content hash.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

impl ErrorCode for PolicyError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoRuleForAction(_) => "PRG_NO_RULE",
            Self::Compile(_) => "PRG_COMPILE_ERROR",
            Self::Eval(_) | Self::NotBoolean => "PRG_EVAL_ERROR",
            Self::DepthExceeded(_) => "PRG_DEPTH_EXCEEDED",
            Self::CostExceeded(_) => "PRG_COST_EXCEEDED",
            Self::Canon(e) => e.code(),
        }
    }
}

impl Classify for PolicyError {
    fn classification(&self) -> Classification {
        Classification::NonRetryable
    }
}

/// Errors raised by budget tracking.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// No budget exists under the requested id.
    #[error("budget not found: {0}")]
    NotFound(String),
    /// The cost's resource type did not match the budget's.
    #[error("currency mismatch: budget is {expected}, cost is {got}")]
    CurrencyMismatch {
        /// Resource type carried by the budget.
        expected: String,
        /// Resource type carried by the cost.
        got: String,
    },
    /// Consuming the cost would exceed the budget limit.
    #[error("budget exceeded: {budget_id} would reach {would_be} over limit {limit}")]
    Exceeded {
        /// The budget that rejected the consume.
        budget_id: String,
        /// The hypothetical post-consume total.
        would_be: u64,
        /// The enforced limit.
        limit: u64,
    },
    /// The backing store failed.
    #[error("budget backend error: {0}")]
    Backend(String),
}

impl ErrorCode for BudgetError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "BUDGET_NOT_FOUND",
            Self::CurrencyMismatch { .. } => "BUDGET_CURRENCY_MISMATCH",
            Self::Exceeded { .. } => "BUDGET_EXCEEDED",
            Self::Backend(_) => "BUDGET_BACKEND_ERROR",
        }
    }
}

impl Classify for BudgetError {
    fn classification(&self) -> Classification {
        match self {
            Self::Backend(_) => Classification::Retryable,
            _ => Classification::NonRetryable,
        }
    }
}

/// Errors raised while signing or verifying kernel records.
#[derive(Debug, Error)]
pub enum SignError {
    /// The underlying primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The record failed canonicalization prior to signing.
    #[error(transparent)]
    Canon(#[from] CanonError),
    /// The record carried no signature to verify.
    #[error("record carries no signature")]
    MissingSignature,
    /// No verifying key is configured for the named signer.
    #[error("no verifying key configured for signer {0:?}")]
    UnknownSigner(String),
}

impl ErrorCode for SignError {
    fn code(&self) -> &'static str {
        match self {
            Self::Crypto(e) => e.code(),
            Self::Canon(e) => e.code(),
            Self::MissingSignature => "SIGN_MISSING_SIGNATURE",
            Self::UnknownSigner(_) => "SIGN_UNKNOWN_SIGNER",
        }
    }
}

/// Errors surfaced by the guardian's decision pipeline.
///
/// These are the *hard* failures: conditions under which no decision can be
/// returned at all. Policy denials are not errors; they are signed FAIL
/// records.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// Evidence referenced by the request does not exist. The request is
    /// malformed; no decision is produced.
    #[error("referenced evidence missing: {0}")]
    MissingEvidence(String),
    /// The decision could not be recorded; it must not be returned.
    #[error("audit persistence failed: {0}")]
    Audit(#[from] AuditError),
    /// The decision could not be signed; it must not be returned.
    #[error("signing failed: {0}")]
    Sign(#[from] SignError),
    /// The registry failed while fetching evidence.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The request itself violated CSNF; no decision can cover it.
    #[error(transparent)]
    Canon(#[from] CanonError),
    /// An intent was requested for a record that does not qualify.
    #[error("intent refused: {0}")]
    IntentRefused(String),
    /// An internal invariant failed.
    #[error("internal guardian error: {0}")]
    Internal(String),
}

impl ErrorCode for GuardianError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingEvidence(_) => "GUARDIAN_MISSING_EVIDENCE",
            Self::Audit(e) => e.code(),
            Self::Sign(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Canon(e) => e.code(),
            Self::IntentRefused(_) => "GUARDIAN_INTENT_REFUSED",
            Self::Internal(_) => "GUARDIAN_INTERNAL",
        }
    }
}

impl Classify for GuardianError {
    fn classification(&self) -> Classification {
        match self {
            // The decision may have consumed budget before the append died;
            // the caller must reconcile before re-submitting.
            Self::Audit(_) => Classification::CompensationRequired,
            Self::Registry(e) => e.classification(),
            _ => Classification::NonRetryable,
        }
    }
}

/// Errors raised while resolving kernel configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `ARTIFACT_STORAGE_TYPE` was not one of `fs`, `s3`, `gcs`.
    #[error("unrecognized storage type: {0:?}")]
    InvalidStorageType(String),
    /// A numeric option failed to parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// The offending environment variable.
        key: &'static str,
        /// The raw value observed.
        value: String,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidStorageType(_) => "CONFIG_INVALID_STORAGE_TYPE",
            Self::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CanonError::InvalidUtf8.code(), "CSNF_INVALID_UTF8");
        assert_eq!(
            LedgerError::LockedByAnotherWorker.code(),
            "LEDGER_LOCKED_BY_ANOTHER_WORKER"
        );
        assert_eq!(
            PolicyError::NoRuleForAction("x".into()).code(),
            "PRG_NO_RULE"
        );
        assert_eq!(PolicyError::Eval("boom".into()).code(), "PRG_EVAL_ERROR");
    }

    #[test]
    fn classification_follows_propagation_table() {
        assert!(matches!(
            CanonError::InvalidUtf8.classification(),
            Classification::NonRetryable
        ));
        assert!(matches!(
            CasError::Backend("io".into()).classification(),
            Classification::Retryable
        ));
        assert!(matches!(
            LedgerError::LockedByAnotherWorker.classification(),
            Classification::IdempotentSafe
        ));
    }
}
