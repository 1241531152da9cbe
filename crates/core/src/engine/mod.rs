//! Procurement decision engine.
//!
//! `ProcurementEngine` owns the registry of forecast series together with the latest snapshot
//! set. Both live in one immutable `EngineState` that `evaluate` rebuilds and swaps in whole, so a
//! reader holding an `Arc` never sees a mix of two evaluations.

pub mod action;
pub mod calculator;
pub mod correlation;
pub mod error;
pub mod risk;
pub mod savings;
pub mod summary;

use crate::domain::material::{ForecastSeries, MaterialId};
use crate::domain::recommendation::{
    ActionDecision, ClassifiedPoint, ClassifiedSeries, RecommendationSnapshot, RiskProfile,
    SnapshotSet,
};
use action::ActionPolicy;
use correlation::CorrelationMatrix;
use error::{EngineError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct EngineState {
    series: BTreeMap<MaterialId, ForecastSeries>,
    risks: BTreeMap<MaterialId, RiskProfile>,
    snapshots: Arc<SnapshotSet>,
}

#[derive(Debug, Default)]
pub struct ProcurementEngine {
    policy: ActionPolicy,
    state: RwLock<Option<Arc<EngineState>>>,
    // Serializes evaluate() so concurrent refreshes cannot interleave their swaps.
    writer: Mutex<()>,
}

impl ProcurementEngine {
    pub fn new(policy: ActionPolicy) -> Self {
        Self {
            policy,
            state: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Classifies every material at its current month and replaces the cached state.
    ///
    /// Materials without a volatility input fall back to the dispersion of their own forecast.
    pub fn evaluate(
        &self,
        materials: BTreeMap<MaterialId, ForecastSeries>,
        volatility: BTreeMap<MaterialId, f64>,
    ) -> Result<Arc<SnapshotSet>> {
        let _writer = self.writer.lock();

        if let Some(unknown) = volatility.keys().find(|m| !materials.contains_key(*m)) {
            return Err(EngineError::UnknownMaterial(unknown.clone()));
        }

        let mut risks = BTreeMap::new();
        let mut snapshots = BTreeMap::new();
        for (material, series) in &materials {
            if series.material() != material {
                return Err(EngineError::invalid(format!(
                    "series registered as {material} belongs to {}",
                    series.material()
                )));
            }

            let volatility_pct = match volatility.get(material) {
                Some(v) => *v,
                None => {
                    let estimated =
                        risk::historical_volatility_pct(&series.prices()).unwrap_or(0.0);
                    tracing::debug!(
                        %material,
                        estimated,
                        "no volatility input; using forecast dispersion"
                    );
                    estimated
                }
            };
            let risk = risk::profile(material, volatility_pct)?;
            let snapshot = self.snapshot(series, risk.clone())?;

            risks.insert(material.clone(), risk);
            snapshots.insert(material.clone(), snapshot);
        }

        let set = Arc::new(SnapshotSet {
            evaluation_id: uuid::Uuid::new_v4(),
            generated_at: chrono::Utc::now(),
            snapshots,
        });
        let next = Arc::new(EngineState {
            series: materials,
            risks,
            snapshots: Arc::clone(&set),
        });

        *self.state.write() = Some(next);

        tracing::debug!(
            evaluation_id = %set.evaluation_id,
            materials_len = set.snapshots.len(),
            "procurement snapshot set replaced"
        );
        Ok(set)
    }

    /// Latest snapshot set, if `evaluate` has succeeded at least once.
    pub fn latest(&self) -> Option<Arc<SnapshotSet>> {
        self.current().map(|s| Arc::clone(&s.snapshots))
    }

    pub fn snapshot_for(&self, material: &str) -> Result<RecommendationSnapshot> {
        let state = self.require_state(material)?;
        state
            .snapshots
            .snapshots
            .get(material)
            .cloned()
            .ok_or_else(|| unknown(material))
    }

    /// Every point of the registered series, each classified as if it were the purchase month.
    pub fn forecast_for(&self, material: &str) -> Result<ClassifiedSeries> {
        let state = self.require_state(material)?;
        let series = state.series.get(material).ok_or_else(|| unknown(material))?;
        let risk = state.risks.get(material).cloned().ok_or_else(|| unknown(material))?;

        let mut points = Vec::with_capacity(series.points().len());
        for (index, point) in series.points().iter().enumerate() {
            let assessment = action::assess(series, index, &self.policy)?;
            points.push(ClassifiedPoint {
                period: point.period,
                unit_price: point.unit_price,
                action: assessment.action,
                savings_per_unit: savings::savings_for(series, &assessment),
                best_future_period: assessment
                    .best_future_index
                    .filter(|_| assessment.action == ActionDecision::Wait)
                    .map(|i| series.points()[i].period),
            });
        }

        Ok(ClassifiedSeries {
            material: series.material().clone(),
            risk,
            points,
        })
    }

    /// The registered series, for correlation over the same data the snapshots came from.
    pub fn series(&self) -> BTreeMap<MaterialId, ForecastSeries> {
        self.current()
            .map(|s| s.series.clone())
            .unwrap_or_default()
    }

    /// Pairwise correlation over the series of the current state, `None` before the first
    /// evaluation.
    pub fn correlations(&self) -> Option<CorrelationMatrix> {
        self.current().map(|s| correlation::correlate(&s.series))
    }

    fn snapshot(
        &self,
        series: &ForecastSeries,
        risk: RiskProfile,
    ) -> Result<RecommendationSnapshot> {
        let assessment = action::assess(series, 0, &self.policy)?;
        Ok(RecommendationSnapshot {
            material: series.material().clone(),
            as_of_period: series.current().period,
            unit_price: assessment.unit_price,
            action: assessment.action,
            savings_per_unit: savings::savings_for(series, &assessment),
            risk,
        })
    }

    fn current(&self) -> Option<Arc<EngineState>> {
        self.state.read().clone()
    }

    fn require_state(&self, material: &str) -> Result<Arc<EngineState>> {
        self.current().ok_or_else(|| unknown(material))
    }
}

fn unknown(material: &str) -> EngineError {
    match MaterialId::new(material) {
        Ok(id) => EngineError::UnknownMaterial(id),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::RiskLevel;
    use crate::engine::action::tests::series_from;

    fn inputs() -> (BTreeMap<MaterialId, ForecastSeries>, BTreeMap<MaterialId, f64>) {
        let series = vec![
            series_from(
                "Timber",
                (2025, 10),
                &[3812.31, 3833.51, 3841.10, 3844.61, 3884.60, 3912.03],
                None,
            ),
            series_from(
                "Cabling",
                (2025, 10),
                &[47.80, 48.42, 48.62, 47.89, 48.08, 48.36],
                None,
            ),
            series_from(
                "Cement",
                (2025, 10),
                &[13.45, 13.51, 13.52, 13.60, 13.59, 13.58],
                None,
            ),
        ];
        let materials: BTreeMap<_, _> = series
            .into_iter()
            .map(|s| (s.material().clone(), s))
            .collect();
        let volatility = [("Timber", 12.1), ("Cabling", 15.5), ("Cement", 3.8)]
            .into_iter()
            .map(|(m, v)| (MaterialId::new(m).unwrap(), v))
            .collect();
        (materials, volatility)
    }

    #[test]
    fn evaluate_builds_one_snapshot_per_material() {
        let engine = ProcurementEngine::default();
        let (materials, volatility) = inputs();
        let set = engine.evaluate(materials, volatility).unwrap();

        assert_eq!(set.snapshots.len(), 3);
        let timber = &set.snapshots["Timber"];
        assert_eq!(timber.action, ActionDecision::BuyNow);
        assert!((timber.savings_per_unit - (3912.03 - 3812.31)).abs() < 1e-6);
        assert_eq!(timber.risk.level, RiskLevel::High);
        assert_eq!(timber.as_of_period.to_string(), "Oct 2025");

        let cabling = &set.snapshots["Cabling"];
        assert_eq!(cabling.action, ActionDecision::BuyNow);
        assert!((cabling.savings_per_unit - (48.62 - 47.80)).abs() < 1e-6);
        assert_eq!(cabling.risk.level, RiskLevel::Critical);
    }

    #[test]
    fn evaluate_is_idempotent_on_unchanged_inputs() {
        let engine = ProcurementEngine::default();
        let (materials, volatility) = inputs();
        let first = engine.evaluate(materials.clone(), volatility.clone()).unwrap();
        let second = engine.evaluate(materials, volatility).unwrap();
        assert_eq!(first.snapshots, second.snapshots);
        assert_ne!(first.evaluation_id, second.evaluation_id);
    }

    #[test]
    fn evaluate_replaces_rather_than_merges() {
        let engine = ProcurementEngine::default();
        let (materials, volatility) = inputs();
        engine.evaluate(materials, volatility).unwrap();

        let only_cement: BTreeMap<_, _> = [series_from("Cement", (2025, 11), &[13.51, 13.52], None)]
            .into_iter()
            .map(|s| (s.material().clone(), s))
            .collect();
        engine.evaluate(only_cement, BTreeMap::new()).unwrap();

        let latest = engine.latest().unwrap();
        assert_eq!(latest.snapshots.len(), 1);
        assert!(matches!(
            engine.forecast_for("Timber"),
            Err(EngineError::UnknownMaterial(_))
        ));
    }

    #[test]
    fn failed_evaluation_keeps_previous_state() {
        let engine = ProcurementEngine::default();
        let (materials, volatility) = inputs();
        let before = engine.evaluate(materials.clone(), volatility).unwrap();

        let mut bad = BTreeMap::new();
        bad.insert(MaterialId::new("Timber").unwrap(), -1.0);
        assert!(matches!(
            engine.evaluate(materials, bad),
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(engine.latest().unwrap().evaluation_id, before.evaluation_id);
    }

    #[test]
    fn volatility_for_unregistered_material_is_unknown() {
        let engine = ProcurementEngine::default();
        let (materials, mut volatility) = inputs();
        volatility.insert(MaterialId::new("Copper").unwrap(), 8.0);
        assert_eq!(
            engine.evaluate(materials, volatility).unwrap_err(),
            EngineError::UnknownMaterial(MaterialId::new("Copper").unwrap())
        );
    }

    #[test]
    fn mismatched_registry_key_is_invalid() {
        let engine = ProcurementEngine::default();
        let mut materials = BTreeMap::new();
        materials.insert(
            MaterialId::new("Steel").unwrap(),
            series_from("Cement", (2025, 10), &[13.45], None),
        );
        assert!(matches!(
            engine.evaluate(materials, BTreeMap::new()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_volatility_falls_back_to_forecast_dispersion() {
        let engine = ProcurementEngine::default();
        let (materials, _) = inputs();
        let set = engine.evaluate(materials, BTreeMap::new()).unwrap();
        for snapshot in set.snapshots.values() {
            assert!(snapshot.risk.volatility_pct >= 0.0);
            assert_eq!(snapshot.risk.level, RiskLevel::Low);
        }
    }

    #[test]
    fn forecast_for_classifies_every_point() {
        let engine = ProcurementEngine::default();
        let (materials, volatility) = inputs();
        engine.evaluate(materials, volatility).unwrap();

        let cabling = engine.forecast_for("Cabling").unwrap();
        assert_eq!(cabling.points.len(), 6);
        let actions: Vec<_> = cabling.points.iter().map(|p| p.action).collect();
        assert_eq!(
            actions,
            vec![
                ActionDecision::BuyNow,
                ActionDecision::Wait,
                ActionDecision::Avoid,
                ActionDecision::BuyNow,
                ActionDecision::Neutral,
                ActionDecision::Neutral,
            ]
        );
        assert_eq!(cabling.points[1].best_future_period.unwrap().to_string(), "Jan 2026");
        assert_eq!(cabling.points[2].best_future_period, None);
        assert!(cabling.points[3].savings_per_unit > 0.0);
        assert_eq!(cabling.risk.level, RiskLevel::Critical);
    }

    #[test]
    fn lookups_before_evaluation_are_unknown_material() {
        let engine = ProcurementEngine::default();
        assert!(engine.latest().is_none());
        assert!(engine.series().is_empty());
        assert!(matches!(
            engine.snapshot_for("Timber"),
            Err(EngineError::UnknownMaterial(_))
        ));
    }

    #[test]
    fn correlations_read_the_evaluated_series() {
        let engine = ProcurementEngine::default();
        assert!(engine.correlations().is_none());

        let (materials, volatility) = inputs();
        engine.evaluate(materials, volatility).unwrap();
        let matrix = engine.correlations().unwrap();
        assert_eq!(matrix.materials.len(), 3);
        assert_eq!(matrix.get("Timber", "Timber"), Some(1.0));

        let pair: BTreeMap<_, _> = [
            series_from("Steel", (2025, 10), &[100.0, 110.0, 120.0], None),
            series_from("Copper", (2025, 10), &[9.0, 8.0, 7.0], None),
        ]
        .into_iter()
        .map(|s| (s.material().clone(), s))
        .collect();
        engine.evaluate(pair, BTreeMap::new()).unwrap();
        let matrix = engine.correlations().unwrap();
        assert_eq!(matrix.materials.len(), 2);
        assert!((matrix.get("Steel", "Copper").unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(matrix.get("Timber", "Steel"), None);
    }

    fn alternate_inputs() -> (BTreeMap<MaterialId, ForecastSeries>, BTreeMap<MaterialId, f64>) {
        let materials: BTreeMap<_, _> = [
            series_from("Timber", (2025, 11), &[3950.00, 3900.00, 3925.50], None),
            series_from("Cement", (2025, 11), &[14.10, 14.25], Some(14.40)),
        ]
        .into_iter()
        .map(|s| (s.material().clone(), s))
        .collect();
        let volatility = [("Timber", 4.2), ("Cement", 9.9)]
            .into_iter()
            .map(|(m, v)| (MaterialId::new(m).unwrap(), v))
            .collect();
        (materials, volatility)
    }

    #[test]
    fn concurrent_readers_never_see_a_mix_of_two_evaluations() {
        let engine = Arc::new(ProcurementEngine::default());
        let a = inputs();
        let b = alternate_inputs();
        let expected_a = engine.evaluate(a.0.clone(), a.1.clone()).unwrap().snapshots.clone();
        let expected_b = engine.evaluate(b.0.clone(), b.1.clone()).unwrap().snapshots.clone();
        assert_ne!(expected_a, expected_b);
        assert_ne!(expected_a["Timber"], expected_b["Timber"]);

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let engine = Arc::clone(&engine);
                let (a, b) = (&a, &b);
                scope.spawn(move || {
                    for round in 0..50 {
                        let (materials, volatility) = if (writer + round) % 2 == 0 { a } else { b };
                        engine.evaluate(materials.clone(), volatility.clone()).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let engine = Arc::clone(&engine);
                let (expected_a, expected_b) = (&expected_a, &expected_b);
                scope.spawn(move || {
                    for _ in 0..200 {
                        let set = engine.latest().unwrap();
                        assert!(
                            set.snapshots == *expected_a || set.snapshots == *expected_b,
                            "observed a mixed snapshot set: {:?}",
                            set.snapshots.keys().collect::<Vec<_>>()
                        );

                        let timber = engine.forecast_for("Timber").unwrap();
                        let first = timber.points[0].unit_price;
                        assert!(first == 3812.31 || first == 3950.00, "{first}");
                    }
                });
            }
        });
    }
}
