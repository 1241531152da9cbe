use crate::domain::material::{MaterialId, Period};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionDecision {
    BuyNow,
    Wait,
    Avoid,
    Neutral,
}

impl ActionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionDecision::BuyNow => "BUY_NOW",
            ActionDecision::Wait => "WAIT",
            ActionDecision::Avoid => "AVOID",
            ActionDecision::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for ActionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,      // < 5
    Moderate, // 5-10
    High,     // 10-15
    Critical, // >= 15
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built by `engine::risk::profile`, which derives `level` from `volatility_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub material: MaterialId,
    pub volatility_pct: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSnapshot {
    pub material: MaterialId,
    pub as_of_period: Period,
    pub unit_price: f64,
    pub action: ActionDecision,
    pub savings_per_unit: f64,
    pub risk: RiskProfile,
}

/// The result of one `evaluate` call. `snapshots` is a pure function of the inputs; the
/// envelope identifies the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub evaluation_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub snapshots: BTreeMap<MaterialId, RecommendationSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPoint {
    pub period: Period,
    pub unit_price: f64,
    pub action: ActionDecision,
    pub savings_per_unit: f64,
    /// Earliest period with the lowest forward price; set for WAIT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_future_period: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSeries {
    pub material: MaterialId,
    pub risk: RiskProfile,
    pub points: Vec<ClassifiedPoint>,
}
