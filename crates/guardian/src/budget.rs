// Path: crates/guardian/src/budget.rs
//! Atomic multi-resource budget tracking.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use helm_types::app::{Budget, Cost};
use helm_types::error::BudgetError;

/// The budget tracker. Each budget lives in its own `DashMap` entry, and
/// `check`/`consume` run under that entry's exclusive lock, so two
/// concurrent consumers can never double-charge the same budget.
#[derive(Default)]
pub struct BudgetTracker {
    budgets: DashMap<String, Budget>,
}

impl BudgetTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a budget.
    pub fn register(&self, budget: Budget) {
        self.budgets.insert(budget.id.clone(), budget);
    }

    /// A snapshot of a budget's current state.
    pub fn get(&self, budget_id: &str) -> Result<Budget, BudgetError> {
        self.budgets
            .get(budget_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| BudgetError::NotFound(budget_id.to_string()))
    }

    /// Whether the cost could be consumed right now. `Ok(false)` means the
    /// budget is live but the cost would exceed its limit.
    pub fn check(
        &self,
        budget_id: &str,
        cost: Cost,
        now: DateTime<Utc>,
    ) -> Result<bool, BudgetError> {
        let mut entry = self
            .budgets
            .get_mut(budget_id)
            .ok_or_else(|| BudgetError::NotFound(budget_id.to_string()))?;
        roll_window(&mut entry, now);
        check_cost(&entry, cost).map(|would_be| would_be <= entry.limit)
    }

    /// Atomically consumes a cost. Rejects when `consumed + amount` would
    /// exceed the limit; on success returns the updated budget.
    pub fn consume(
        &self,
        budget_id: &str,
        cost: Cost,
        now: DateTime<Utc>,
    ) -> Result<Budget, BudgetError> {
        let mut entry = self
            .budgets
            .get_mut(budget_id)
            .ok_or_else(|| BudgetError::NotFound(budget_id.to_string()))?;
        roll_window(&mut entry, now);
        let would_be = check_cost(&entry, cost)?;
        if would_be > entry.limit {
            return Err(BudgetError::Exceeded {
                budget_id: budget_id.to_string(),
                would_be,
                limit: entry.limit,
            });
        }
        entry.consumed = would_be;
        Ok(entry.clone())
    }
}

/// Validates the cost against the budget's currency and computes the
/// hypothetical post-consume total.
fn check_cost(budget: &Budget, cost: Cost) -> Result<u64, BudgetError> {
    if cost.resource_type != budget.resource_type {
        return Err(BudgetError::CurrencyMismatch {
            expected: budget.resource_type.to_string(),
            got: cost.resource_type.to_string(),
        });
    }
    Ok(budget.consumed.saturating_add(cost.amount))
}

/// Applies window rollover: once `reset_at` passes, consumption restarts.
fn roll_window(budget: &mut Budget, now: DateTime<Utc>) {
    if let Some(reset_at) = budget.reset_at {
        if now >= reset_at {
            budget.consumed = 0;
            budget.reset_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use helm_types::app::ResourceType;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    fn tokens(amount: u64) -> Cost {
        Cost {
            resource_type: ResourceType::Tokens,
            amount,
        }
    }

    #[test]
    fn consume_enforces_limit() {
        let tracker = BudgetTracker::new();
        tracker.register(Budget::new("b", ResourceType::Tokens, 1000));

        tracker.consume("b", tokens(900), t0()).unwrap();
        let err = tracker.consume("b", tokens(200), t0()).unwrap_err();
        assert!(matches!(err, BudgetError::Exceeded { would_be: 1100, .. }));
        assert_eq!(tracker.get("b").unwrap().consumed, 900);
    }

    #[test]
    fn currency_mismatch_is_an_error() {
        let tracker = BudgetTracker::new();
        tracker.register(Budget::new("b", ResourceType::Usd, 100));
        let err = tracker.check("b", tokens(1), t0()).unwrap_err();
        assert!(matches!(err, BudgetError::CurrencyMismatch { .. }));
    }

    #[test]
    fn concurrent_consumers_cannot_double_charge() {
        let tracker = Arc::new(BudgetTracker::new());
        tracker.register(Budget::new("b", ResourceType::Tokens, 1000));

        let first = {
            let tracker = tracker.clone();
            std::thread::spawn(move || tracker.consume("b", tokens(500), t0()))
        };
        let second = {
            let tracker = tracker.clone();
            std::thread::spawn(move || tracker.consume("b", tokens(600), t0()))
        };
        let results = [first.join().unwrap(), second.join().unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(tracker.get("b").unwrap().consumed <= 1000);
    }

    #[test]
    fn window_rollover_resets_consumption() {
        let tracker = BudgetTracker::new();
        let mut budget = Budget::new("b", ResourceType::Requests, 2);
        budget.reset_at = Some(t0() + Duration::hours(1));
        tracker.register(budget);

        tracker
            .consume("b", Cost::one_request(), t0())
            .unwrap();
        tracker
            .consume("b", Cost::one_request(), t0())
            .unwrap();
        assert!(!tracker.check("b", Cost::one_request(), t0()).unwrap());

        // Past the reset boundary, the window restarts.
        let later = t0() + Duration::hours(2);
        assert!(tracker.check("b", Cost::one_request(), later).unwrap());
        tracker.consume("b", Cost::one_request(), later).unwrap();
        assert_eq!(tracker.get("b").unwrap().consumed, 1);
    }

    #[test]
    fn missing_budget_is_not_found() {
        let tracker = BudgetTracker::new();
        assert!(matches!(
            tracker.check("ghost", tokens(1), t0()),
            Err(BudgetError::NotFound(_))
        ));
    }
}
