use crate::domain::material::MaterialId;
use crate::domain::recommendation::{RiskLevel, RiskProfile};
use crate::engine::error::{EngineError, Result};

// Inclusive lower bounds, in percent.
pub const MODERATE_VOLATILITY_PCT: f64 = 5.0;
pub const HIGH_VOLATILITY_PCT: f64 = 10.0;
pub const CRITICAL_VOLATILITY_PCT: f64 = 15.0;

pub fn classify(volatility_pct: f64) -> Result<RiskLevel> {
    if !volatility_pct.is_finite() || volatility_pct < 0.0 {
        return Err(EngineError::invalid(format!(
            "volatility_pct must be a non-negative finite number (got {volatility_pct})"
        )));
    }

    let level = if volatility_pct >= CRITICAL_VOLATILITY_PCT {
        RiskLevel::Critical
    } else if volatility_pct >= HIGH_VOLATILITY_PCT {
        RiskLevel::High
    } else if volatility_pct >= MODERATE_VOLATILITY_PCT {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    };
    Ok(level)
}

pub fn profile(material: &MaterialId, volatility_pct: f64) -> Result<RiskProfile> {
    let level = classify(volatility_pct).map_err(|e| match e {
        EngineError::InvalidInput(msg) => EngineError::InvalidInput(format!("{material}: {msg}")),
        other => other,
    })?;
    Ok(RiskProfile {
        material: material.clone(),
        volatility_pct,
        level,
    })
}

/// Population standard deviation of period-over-period percentage changes, in percent.
///
/// Used when no volatility figure was supplied for a material. `None` with fewer than two prices.
pub fn historical_volatility_pct(prices: &[f64]) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }

    let changes: Vec<f64> = prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0] * 100.0)
        .collect();
    let n = changes.len() as f64;
    let mean = changes.iter().sum::<f64>() / n;
    let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}
