//! Closed-form valuation primitives. Each module exposes pure functions over
//! plain inputs plus a [`PricingModel`](crate::registry::PricingModel) adapter.

pub mod capm;
pub mod crypto;
pub mod dcf;
pub mod ddm;
pub mod forex;

use serde::Serialize;

/// Coarse risk bucket reported next to fundamental valuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Three or more factors is high, any factor is medium.
    pub fn from_factors(factors: u32) -> Self {
        match factors {
            0 => Self::Low,
            1 | 2 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}
