use crate::domain::material::{MaterialId, Period};
use crate::domain::recommendation::RecommendationSnapshot;
use crate::engine::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_NON_OPTIMAL_PREMIUM: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatorConfig {
    /// Fractional price penalty for buying outside the optimal window.
    pub non_optimal_premium: f64,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            non_optimal_premium: DEFAULT_NON_OPTIMAL_PREMIUM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "period", rename_all = "snake_case")]
pub enum PurchaseTiming {
    Optimal,
    Other(Period),
}

impl FromStr for PurchaseTiming {
    type Err = EngineError;

    /// `optimal`, or any period `Period` accepts.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("optimal") {
            return Ok(Self::Optimal);
        }
        s.parse().map(Self::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasePlan {
    pub material: MaterialId,
    pub quantity: i64,
    pub timing: PurchaseTiming,
    pub unit_price: f64,
    pub total_cost: f64,
    pub total_savings: f64,
}

pub fn plan(
    snapshot: &RecommendationSnapshot,
    quantity: i64,
    timing: PurchaseTiming,
    config: &CalculatorConfig,
) -> Result<PurchasePlan> {
    if quantity <= 0 {
        return Err(EngineError::InvalidQuantity(quantity));
    }
    let premium = config.non_optimal_premium;
    if !premium.is_finite() || premium < 0.0 {
        return Err(EngineError::invalid(format!(
            "non_optimal_premium must be a non-negative finite number (got {premium})"
        )));
    }

    let qty = quantity as f64;
    let (unit_price, total_savings) = match timing {
        PurchaseTiming::Optimal => (snapshot.unit_price, snapshot.savings_per_unit * qty),
        PurchaseTiming::Other(period) => {
            if period < snapshot.as_of_period {
                return Err(EngineError::invalid(format!(
                    "{}: purchase period {period} is before {}",
                    snapshot.material, snapshot.as_of_period
                )));
            }
            (snapshot.unit_price * (1.0 + premium), 0.0)
        }
    };

    Ok(PurchasePlan {
        material: snapshot.material.clone(),
        quantity,
        timing,
        unit_price,
        total_cost: unit_price * qty,
        total_savings,
    })
}
