use crate::domain::material::{MaterialId, Period};
use crate::domain::recommendation::{ActionDecision, RiskLevel, RiskProfile, SnapshotSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub materials: usize,
    pub total_savings_per_unit: f64,
    /// Savings as a share of the do-nothing spend for one unit of each material.
    pub potential_savings_pct: f64,
    pub highest_savings: Option<MaterialSavings>,
    pub highest_risk: Option<RiskProfile>,
    pub optimal_window: Option<OptimalWindow>,
    pub alerts: Vec<RiskAlert>,
    pub risk_table: Vec<RiskProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSavings {
    pub material: MaterialId,
    pub savings_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalWindow {
    pub period: Period,
    pub materials: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub severity: AlertSeverity,
    pub material: MaterialId,
    pub level: RiskLevel,
    pub volatility_pct: f64,
}

pub fn summarize(set: &SnapshotSet) -> PortfolioSummary {
    let snapshots: Vec<_> = set.snapshots.values().collect();

    let total_savings_per_unit: f64 = snapshots.iter().map(|s| s.savings_per_unit).sum();
    let do_nothing_spend: f64 = snapshots
        .iter()
        .map(|s| s.unit_price + s.savings_per_unit)
        .sum();
    let potential_savings_pct = if do_nothing_spend > 0.0 {
        total_savings_per_unit / do_nothing_spend * 100.0
    } else {
        0.0
    };

    // Snapshots iterate in material order, so `>` keeps the first id on ties.
    let mut highest_savings: Option<MaterialSavings> = None;
    for s in &snapshots {
        if s.savings_per_unit > 0.0
            && highest_savings
                .as_ref()
                .map_or(true, |h| s.savings_per_unit > h.savings_per_unit)
        {
            highest_savings = Some(MaterialSavings {
                material: s.material.clone(),
                savings_per_unit: s.savings_per_unit,
            });
        }
    }

    let mut risk_table: Vec<RiskProfile> = snapshots.iter().map(|s| s.risk.clone()).collect();
    risk_table.sort_by(|a, b| b.volatility_pct.total_cmp(&a.volatility_pct));

    let alerts = risk_table
        .iter()
        .filter_map(|r| {
            let severity = match r.level {
                RiskLevel::Critical => AlertSeverity::Critical,
                RiskLevel::High => AlertSeverity::Warning,
                RiskLevel::Moderate | RiskLevel::Low => return None,
            };
            Some(RiskAlert {
                severity,
                material: r.material.clone(),
                level: r.level,
                volatility_pct: r.volatility_pct,
            })
        })
        .collect();

    PortfolioSummary {
        materials: snapshots.len(),
        total_savings_per_unit,
        potential_savings_pct,
        highest_savings,
        highest_risk: risk_table.first().cloned(),
        optimal_window: optimal_window(set),
        alerts,
        risk_table,
    }
}

fn optimal_window(set: &SnapshotSet) -> Option<OptimalWindow> {
    let mut counts = BTreeMap::<Period, usize>::new();
    for s in set.snapshots.values() {
        if s.action == ActionDecision::BuyNow {
            *counts.entry(s.as_of_period).or_default() += 1;
        }
    }

    // Earliest period wins a tie.
    let (period, materials) = counts
        .into_iter()
        .fold(None, |best: Option<(Period, usize)>, (p, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((p, c)),
        })?;

    Some(OptimalWindow {
        period,
        materials,
        share_pct: materials as f64 / set.snapshots.len() as f64 * 100.0,
    })
}
