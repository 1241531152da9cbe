//! Point-in-time purchase action for a forecast series.
//!
//! A price is compared against two things: the prices still ahead of it in the series, and a
//! reference price (the previous period, or for the current month the caller's baseline, falling
//! back to the series maximum). Differences within `epsilon` count as flat.

use crate::domain::material::ForecastSeries;
use crate::domain::recommendation::ActionDecision;
use crate::engine::error::{EngineError, Result};

pub const DEFAULT_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionPolicy {
    /// Price differences at or below this many currency units are treated as no difference.
    pub epsilon: f64,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl ActionPolicy {
    pub fn new(epsilon: f64) -> Result<Self> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(EngineError::invalid(format!(
                "epsilon must be a non-negative finite number (got {epsilon})"
            )));
        }
        Ok(Self { epsilon })
    }
}

/// Classification of one point plus what it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAssessment {
    pub action: ActionDecision,
    pub unit_price: f64,
    /// Index of the earliest lowest forward price, when one exists.
    pub best_future_index: Option<usize>,
}

pub fn classify_action(
    series: &ForecastSeries,
    index: usize,
    policy: &ActionPolicy,
) -> Result<ActionDecision> {
    assess(series, index, policy).map(|a| a.action)
}

pub fn assess(
    series: &ForecastSeries,
    index: usize,
    policy: &ActionPolicy,
) -> Result<PointAssessment> {
    let points = series.points();
    let price = series.price_at(index).ok_or_else(|| {
        EngineError::invalid(format!(
            "{}: index {index} out of range (series has {} points)",
            series.material(),
            points.len()
        ))
    })?;
    let eps = policy.epsilon;
    let reference = reference_price(series, index);

    // Strict `<` keeps the earliest of tied minima.
    let mut min_forward: Option<(usize, f64)> = None;
    let mut max_forward: Option<f64> = None;
    for (offset, point) in points[index + 1..].iter().enumerate() {
        let p = point.unit_price;
        if min_forward.map_or(true, |(_, m)| p < m) {
            min_forward = Some((index + 1 + offset, p));
        }
        max_forward = Some(max_forward.map_or(p, |m: f64| m.max(p)));
    }

    let lower_ahead = min_forward.is_some_and(|(_, m)| m < price - eps);
    let higher_ahead = max_forward.is_some_and(|m| m > price + eps);
    let below_reference = price < reference - eps;
    // A peak needs a real previous month; the current month's reference is only a baseline.
    let above_previous = index > 0 && price > reference + eps;

    let action = if !lower_ahead && below_reference {
        ActionDecision::BuyNow
    } else if lower_ahead && !higher_ahead && above_previous {
        // Peak: up from the previous period and nothing higher ahead, with cheaper months to come.
        ActionDecision::Avoid
    } else if lower_ahead {
        ActionDecision::Wait
    } else {
        ActionDecision::Neutral
    };

    Ok(PointAssessment {
        action,
        unit_price: price,
        best_future_index: min_forward.filter(|_| lower_ahead).map(|(i, _)| i),
    })
}

fn reference_price(series: &ForecastSeries, index: usize) -> f64 {
    match index {
        0 => series
            .baseline_price()
            .unwrap_or_else(|| series.max_price()),
        i => series.points()[i - 1].unit_price,
    }
}
