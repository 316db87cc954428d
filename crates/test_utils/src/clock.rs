// Path: crates/test_utils/src/clock.rs

use chrono::{DateTime, Duration, TimeZone, Utc};
use helm_api::clock::Clock;
use std::sync::Mutex;

/// A clock that only moves when told to. Substituted for the authority
/// clock in unit tests so temporal behavior is fully scripted.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts the clock at an explicit instant.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Advances the clock.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // An arbitrary fixed epoch; tests advance from here.
        Self::starting_at(
            Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
