use crate::domain::material::ForecastSeries;
use crate::domain::recommendation::ActionDecision;
use crate::engine::action::{assess, ActionPolicy, PointAssessment};
use crate::engine::error::Result;

/// Per-unit saving captured by buying at `index` instead of at the do-nothing price.
///
/// Only a BUY_NOW point reports savings; every other action yields 0.
pub fn estimate_savings(
    series: &ForecastSeries,
    index: usize,
    policy: &ActionPolicy,
) -> Result<f64> {
    let assessment = assess(series, index, policy)?;
    Ok(savings_for(series, &assessment))
}

/// The do-nothing-until-forced cost: the highest price in the series.
///
/// A single-point series has no later month to be forced into, so there the supplied baseline
/// stands in when it is higher.
pub fn do_nothing_price(series: &ForecastSeries) -> f64 {
    let max = series.max_price();
    match series.baseline_price() {
        Some(baseline) if series.points().len() == 1 => baseline.max(max),
        _ => max,
    }
}

pub(crate) fn savings_for(series: &ForecastSeries, assessment: &PointAssessment) -> f64 {
    if assessment.action != ActionDecision::BuyNow {
        return 0.0;
    }
    (do_nothing_price(series) - assessment.unit_price).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::classify_action;
    use crate::engine::action::tests::series_from;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn timber_quarter_captures_savings_only_in_october() {
        let series = series_from("Timber", (2025, 10), &[3812.31, 3833.51, 3841.10], None);
        let policy = ActionPolicy::default();

        assert_eq!(classify_action(&series, 0, &policy).unwrap(), ActionDecision::BuyNow);
        assert!(close(estimate_savings(&series, 0, &policy).unwrap(), 28.79));

        for i in 1..3 {
            let action = classify_action(&series, i, &policy).unwrap();
            assert!(matches!(action, ActionDecision::Avoid | ActionDecision::Neutral));
            assert_eq!(estimate_savings(&series, i, &policy).unwrap(), 0.0);
        }
    }

    #[test]
    fn savings_never_negative_and_zero_off_buy_now() {
        let series = series_from(
            "Cabling",
            (2025, 10),
            &[47.80, 48.42, 48.62, 47.89, 48.08, 48.36],
            None,
        );
        let policy = ActionPolicy::default();
        for i in 0..series.points().len() {
            let action = classify_action(&series, i, &policy).unwrap();
            let savings = estimate_savings(&series, i, &policy).unwrap();
            assert!(savings >= 0.0);
            if action != ActionDecision::BuyNow {
                assert_eq!(savings, 0.0, "index {i} action {action}");
            }
        }
    }

    #[test]
    fn last_point_of_a_falling_series_saves_against_the_peak() {
        let series = series_from("Steel", (2025, 10), &[120.0, 110.0, 100.0], None);
        let savings = estimate_savings(&series, 2, &ActionPolicy::default()).unwrap();
        assert!(close(savings, 20.0));
    }

    #[test]
    fn baseline_sets_the_do_nothing_price_of_a_single_point() {
        let series = series_from("Cement", (2025, 10), &[13.45], Some(13.61));
        assert!(close(do_nothing_price(&series), 13.61));
        let savings = estimate_savings(&series, 0, &ActionPolicy::default()).unwrap();
        assert!(close(savings, 0.16));
    }

    #[test]
    fn baseline_above_the_series_max_is_ignored_once_later_months_exist() {
        let series = series_from("Timber", (2025, 10), &[3812.31, 3833.51, 3841.10], Some(3990.0));
        assert!(close(do_nothing_price(&series), 3841.10));
        let policy = ActionPolicy::default();
        assert_eq!(classify_action(&series, 0, &policy).unwrap(), ActionDecision::BuyNow);
        assert!(close(estimate_savings(&series, 0, &policy).unwrap(), 28.79));
    }
}
