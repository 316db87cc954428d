// Path: crates/guardian/src/retry.rs
//! Deterministic backoff and pre-committed retry plans.
//!
//! Jitter is derived from the retry coordinates, not from a random source:
//! two independent computations with identical inputs produce identical
//! plans and identical plan ids, so replicas agree on every scheduled
//! attempt without coordination.

use chrono::{DateTime, Duration, Utc};
use helm_crypto::algorithms::hash::{content_hash_value, sha256};
use helm_types::codec;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A deterministic backoff policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Stable policy identifier; part of the jitter derivation.
    pub id: String,
    /// First-attempt delay in milliseconds.
    pub base_ms: u64,
    /// Hard ceiling on any single delay.
    pub max_ms: u64,
    /// Exclusive upper bound on the jitter component.
    pub max_jitter_ms: u64,
    /// How many attempts a plan materializes.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            base_ms: 100,
            max_ms: 30_000,
            max_jitter_ms: 250,
            max_attempts: 5,
        }
    }
}

/// Derives the jitter for one attempt from the retry coordinates.
pub fn deterministic_jitter(
    policy_id: &str,
    effect_id: &str,
    attempt: u32,
    env_snap_hash: &str,
    max_jitter_ms: u64,
) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }
    let material = format!("{policy_id}\u{0}{effect_id}\u{0}{attempt}\u{0}{env_snap_hash}");
    let digest = sha256(material.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(word) % max_jitter_ms
}

impl BackoffPolicy {
    /// The delay before `attempt` (0-indexed):
    /// `min(base * 2^attempt + jitter, max)`.
    pub fn delay_ms(&self, effect_id: &str, env_snap_hash: &str, attempt: u32) -> u64 {
        let exponential = self
            .base_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let jitter = deterministic_jitter(
            &self.id,
            effect_id,
            attempt,
            env_snap_hash,
            self.max_jitter_ms,
        );
        exponential.saturating_add(jitter).min(self.max_ms)
    }
}

/// One scheduled attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPlanEntry {
    /// 0-indexed attempt number.
    pub attempt_index: u32,
    /// The delay preceding this attempt.
    pub delay_ms: u64,
    /// Absolute scheduled time of this attempt.
    #[serde(with = "helm_types::codec::ts")]
    pub scheduled_at: DateTime<Utc>,
}

/// A pre-committed retry plan: the full schedule, fixed before the first
/// retry fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPlan {
    /// Canonical hash of the plan inputs; identical inputs share an id.
    pub retry_plan_id: String,
    /// The effect being retried.
    pub effect_id: String,
    /// The governing policy id.
    pub policy_id: String,
    /// The environment snapshot the plan was derived under.
    pub env_snap_hash: String,
    /// When the plan starts counting.
    #[serde(with = "helm_types::codec::ts")]
    pub start_time: DateTime<Utc>,
    /// Every attempt, in order.
    pub schedule: Vec<RetryPlanEntry>,
}

impl RetryPlan {
    /// Materializes the fixed schedule for `(effect, policy, env, start)`.
    pub fn materialize(
        effect_id: &str,
        policy: &BackoffPolicy,
        env_snap_hash: &str,
        start_time: DateTime<Utc>,
    ) -> Self {
        let retry_plan_id = content_hash_value(&json!({
            "effect_id": effect_id,
            "policy": policy,
            "env_snap_hash": env_snap_hash,
            "start_time": codec::format_timestamp(&start_time),
        }))
        .map(|h| h.to_string())
        .unwrap_or_default();

        let mut schedule = Vec::with_capacity(policy.max_attempts as usize);
        let mut cursor = start_time;
        for attempt in 0..policy.max_attempts {
            let delay_ms = policy.delay_ms(effect_id, env_snap_hash, attempt);
            cursor += Duration::milliseconds(delay_ms as i64);
            schedule.push(RetryPlanEntry {
                attempt_index: attempt,
                delay_ms,
                scheduled_at: cursor,
            });
        }

        Self {
            retry_plan_id,
            effect_id: effect_id.to_string(),
            policy_id: policy.id.clone(),
            env_snap_hash: env_snap_hash.to_string(),
            start_time,
            schedule,
        }
    }
}
