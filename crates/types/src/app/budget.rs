// Path: crates/types/src/app/budget.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The resource a budget is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// US dollars, in minor units (cents).
    Usd,
    /// Euros, in minor units (cents).
    Eur,
    /// Model tokens.
    Tokens,
    /// Request count.
    Requests,
}

impl ResourceType {
    /// The canonical wire string for this resource type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Tokens => "TOKENS",
            Self::Requests => "REQUESTS",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-resource budget with an atomically enforced limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Unique budget id.
    pub id: String,
    /// The resource this budget is denominated in.
    pub resource_type: ResourceType,
    /// The ceiling. `consumed <= limit` holds at all times.
    pub limit: u64,
    /// The amount consumed so far.
    pub consumed: u64,
    /// Human-readable window description, e.g. `"daily"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// When the window rolls over and `consumed` resets to zero.
    #[serde(with = "crate::codec::ts_opt", default)]
    pub reset_at: Option<DateTime<Utc>>,
}

impl Budget {
    /// Creates a budget with nothing consumed and no window.
    pub fn new(id: impl Into<String>, resource_type: ResourceType, limit: u64) -> Self {
        Self {
            id: id.into(),
            resource_type,
            limit,
            consumed: 0,
            window: None,
            reset_at: None,
        }
    }

    /// The amount still available.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }
}

/// A cost to check or consume against a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// The resource the cost is denominated in.
    pub resource_type: ResourceType,
    /// The amount, in the resource's units.
    pub amount: u64,
}

impl Cost {
    /// The unit cost the guardian charges per authorized request.
    pub fn one_request() -> Self {
        Self {
            resource_type: ResourceType::Requests,
            amount: 1,
        }
    }
}
