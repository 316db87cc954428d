// Path: crates/types/src/error/ir.rs
//! The ErrorIR taxonomy: the RFC-7807-shaped wire form of every kernel failure.
//!
//! External collaborators (the HTTP router, admin tools) serve these objects
//! with the matching HTTP status. The kernel itself only constructs them; it
//! never parses them back.

use serde::{Deserialize, Serialize};

/// The retry classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// The caller may retry with backoff.
    Retryable,
    /// Retrying the same input will fail the same way.
    NonRetryable,
    /// The operation did not commit; retrying is safe without compensation.
    IdempotentSafe,
    /// Partial effects may have committed; a compensating action is required.
    CompensationRequired,
}

/// One link in a canonical cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseEntry {
    /// The stable error code of the contributing failure.
    pub error_code: String,
    /// Where the failure was observed (component path or instance URI).
    pub at: String,
}

/// The kernel-specific extension block of an [`ErrorIr`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmExtension {
    /// The stable, machine-readable error code.
    pub error_code: String,
    /// The namespace the code belongs to (always `"helm"` for kernel errors).
    pub namespace: String,
    /// The retry classification.
    pub classification: Classification,
    /// Every contributing failure, in observation order.
    pub canonical_cause_chain: Vec<CauseEntry>,
}

/// An RFC-7807 problem object extended with the kernel taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorIr {
    /// The problem type URI, derived from the error code.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// A short, human-readable summary.
    pub title: String,
    /// The HTTP status an external server would pair with this problem.
    pub status: u16,
    /// A human-readable explanation specific to this occurrence.
    pub detail: String,
    /// A URI identifying this specific occurrence (decision id or request id).
    pub instance: String,
    /// The kernel extension block.
    pub helm: HelmExtension,
}

impl ErrorIr {
    /// The URI prefix under which kernel problem types are published.
    pub const TYPE_PREFIX: &'static str = "https://helm.mindburn.dev/errors/";

    /// Builds a problem object from a stable error code.
    pub fn new(
        error_code: impl Into<String>,
        title: impl Into<String>,
        status: u16,
        detail: impl Into<String>,
        instance: impl Into<String>,
        classification: Classification,
    ) -> Self {
        let error_code = error_code.into();
        Self {
            type_uri: format!("{}{}", Self::TYPE_PREFIX, error_code),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: instance.into(),
            helm: HelmExtension {
                error_code,
                namespace: "helm".to_string(),
                classification,
                canonical_cause_chain: Vec::new(),
            },
        }
    }

    /// Builds a problem object directly from a kernel error.
    pub fn from_error<E>(err: &E, status: u16, instance: impl Into<String>) -> Self
    where
        E: super::ErrorCode + super::Classify + std::fmt::Display,
    {
        Self::new(
            err.code(),
            err.code().replace('_', " ").to_lowercase(),
            status,
            err.to_string(),
            instance,
            err.classification(),
        )
    }

    /// Appends a contributing failure to the cause chain.
    pub fn with_cause(mut self, error_code: impl Into<String>, at: impl Into<String>) -> Self {
        self.helm.canonical_cause_chain.push(CauseEntry {
            error_code: error_code.into(),
            at: at.into(),
        });
        self
    }

    /// Selects the canonical cause across a multi-error condition.
    ///
    /// Selection is deterministic: the minimum `(error_code, at)` pair under
    /// lexicographic ordering, independent of observation order.
    pub fn canonical_cause(&self) -> Option<&CauseEntry> {
        self.helm
            .canonical_cause_chain
            .iter()
            .min_by(|a, b| (&a.error_code, &a.at).cmp(&(&b.error_code, &b.at)))
    }
}
