// Path: crates/guardian/src/temporal.rs
//! The temporal guardian: a sliding-window controllability envelope with a
//! five-level graded response.
//!
//! All state changes run off the injected authority clock; nothing in this
//! module reads wall time.

use chrono::{DateTime, Duration, Utc};
use helm_api::clock::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// The graded response levels, mildest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseLevel {
    /// Normal operation; effects flow freely.
    Observe,
    /// Effects still flow, but callers must pace themselves.
    Throttle,
    /// Effects are suspended for a short hold.
    Interrupt,
    /// Effects are suspended and the actor is flagged for review.
    Quarantine,
    /// Everything is denied until the hold elapses.
    FailClosed,
}

impl ResponseLevel {
    /// The hold duration a caller must respect at this level.
    pub fn hold(self) -> Duration {
        match self {
            Self::Observe => Duration::zero(),
            Self::Throttle => Duration::seconds(1),
            Self::Interrupt => Duration::seconds(30),
            Self::Quarantine => Duration::seconds(120),
            Self::FailClosed => Duration::seconds(300),
        }
    }

    /// The stable reason code for interventions at this level.
    pub fn reason_code(self) -> &'static str {
        match self {
            Self::Observe => "TEMPORAL_OBSERVE",
            Self::Throttle => "TEMPORAL_THROTTLE",
            Self::Interrupt => "TEMPORAL_INTERRUPT",
            Self::Quarantine => "TEMPORAL_QUARANTINE",
            Self::FailClosed => "TEMPORAL_FAIL_CLOSED",
        }
    }
}

/// One escalation threshold.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    /// The level this threshold escalates to.
    pub level: ResponseLevel,
    /// Events per second at which the threshold trips.
    pub max_rate: f64,
    /// How long the rate must stay above `max_rate` before escalating.
    pub sustained_for: Duration,
    /// How long the rate must stay below `max_rate` before de-escalating
    /// out of this level.
    pub cooldown_after: Duration,
}

/// The full temporal policy: a window plus ordered thresholds.
#[derive(Debug, Clone)]
pub struct TemporalPolicy {
    /// The sliding window over which the rate is computed.
    pub window: Duration,
    /// Thresholds, kept sorted by level ascending.
    pub thresholds: Vec<ThresholdPolicy>,
}

impl TemporalPolicy {
    /// Builds a policy, sorting thresholds by level.
    pub fn new(window: Duration, mut thresholds: Vec<ThresholdPolicy>) -> Self {
        thresholds.sort_by_key(|t| t.level);
        Self { window, thresholds }
    }
}

/// The outcome of one temporal evaluation.
#[derive(Debug, Clone, Copy)]
pub struct TemporalResponse {
    /// The level in force after this evaluation.
    pub level: ResponseLevel,
    /// The observed rate, events per second.
    pub rate: f64,
    /// Whether effects may proceed (`level <= Throttle`).
    pub allow_effect: bool,
    /// The hold duration for the current level.
    pub hold: Duration,
}

struct EnvelopeState {
    events: VecDeque<DateTime<Utc>>,
    level: ResponseLevel,
    level_since: DateTime<Utc>,
    sustain_start: HashMap<ResponseLevel, DateTime<Utc>>,
}

/// The temporal guardian. One mutex serializes all state; each `evaluate`
/// atomically records the event, prunes the window, and computes the level.
pub struct TemporalGuardian {
    clock: Arc<dyn Clock>,
    policy: TemporalPolicy,
    state: Mutex<EnvelopeState>,
}

impl TemporalGuardian {
    /// Creates an envelope starting at `OBSERVE`.
    pub fn new(clock: Arc<dyn Clock>, policy: TemporalPolicy) -> Self {
        let now = clock.now();
        Self {
            clock,
            policy,
            state: Mutex::new(EnvelopeState {
                events: VecDeque::new(),
                level: ResponseLevel::Observe,
                level_since: now,
                sustain_start: HashMap::new(),
            }),
        }
    }

    /// Records one effect event and computes the response.
    pub fn evaluate(&self) -> TemporalResponse {
        self.assess(true)
    }

    /// Computes the response without recording an event. De-escalation
    /// still applies; this is how idle recovery is observed.
    pub fn current(&self) -> TemporalResponse {
        self.assess(false)
    }

    fn assess(&self, record: bool) -> TemporalResponse {
        let now = self.clock.now();
        let Ok(mut state) = self.state.lock() else {
            // A poisoned envelope denies everything.
            return TemporalResponse {
                level: ResponseLevel::FailClosed,
                rate: f64::INFINITY,
                allow_effect: false,
                hold: ResponseLevel::FailClosed.hold(),
            };
        };

        if record {
            state.events.push_back(now);
        }
        let horizon = now - self.policy.window;
        while state.events.front().is_some_and(|ts| *ts <= horizon) {
            state.events.pop_front();
        }

        let window_secs = self.policy.window.num_milliseconds() as f64 / 1000.0;
        let rate = if window_secs > 0.0 {
            state.events.len() as f64 / window_secs
        } else {
            0.0
        };

        // Escalation: any higher threshold whose rate has been sustained
        // long enough; the highest eligible level wins.
        let mut target = state.level;
        let current_level = state.level;
        for threshold in self
            .policy
            .thresholds
            .iter()
            .filter(|t| t.level > current_level)
        {
            if rate >= threshold.max_rate {
                let start = *state
                    .sustain_start
                    .entry(threshold.level)
                    .or_insert(now);
                if now - start >= threshold.sustained_for && threshold.level > target {
                    target = threshold.level;
                }
            } else {
                state.sustain_start.remove(&threshold.level);
            }
        }

        if target > state.level {
            tracing::warn!(
                target: "temporal",
                from = ?state.level,
                to = ?target,
                rate,
                "controllability envelope escalated"
            );
            state.level = target;
            state.level_since = now;
            // Clear lower-level sustain markers.
            state.sustain_start.retain(|level, _| *level > target);
        } else if state.level > ResponseLevel::Observe {
            // De-escalation: below the current level's trip rate for its
            // cooldown drops exactly one level.
            let position = self
                .policy
                .thresholds
                .iter()
                .position(|t| t.level == state.level);
            if let Some((position, threshold)) =
                position.and_then(|p| self.policy.thresholds.get(p).map(|t| (p, t)))
            {
                if rate < threshold.max_rate && now - state.level_since >= threshold.cooldown_after
                {
                    let lower = position
                        .checked_sub(1)
                        .and_then(|p| self.policy.thresholds.get(p))
                        .map(|t| t.level)
                        .unwrap_or(ResponseLevel::Observe);
                    tracing::info!(
                        target: "temporal",
                        from = ?state.level,
                        to = ?lower,
                        rate,
                        "controllability envelope de-escalated"
                    );
                    state.level = lower;
                    state.level_since = now;
                }
            }
        }

        TemporalResponse {
            level: state.level,
            rate,
            allow_effect: state.level <= ResponseLevel::Throttle,
            hold: state.level.hold(),
        }
    }
}
