use crate::domain::material::{ForecastSeries, MaterialId, Period, PricePoint};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Forecast table as delivered by a price feed or a local JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastTable {
    pub materials: Vec<MaterialForecastInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialForecastInput {
    pub material: String,
    #[serde(default)]
    pub volatility_pct: Option<f64>,
    #[serde(default)]
    pub baseline_price: Option<f64>,
    pub points: Vec<ForecastPointInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPointInput {
    pub period: String,
    pub unit_price: f64,
}

/// Validated inputs ready for `ProcurementEngine::evaluate`.
#[derive(Debug, Clone, Default)]
pub struct EngineInputs {
    pub series: BTreeMap<MaterialId, ForecastSeries>,
    pub volatility: BTreeMap<MaterialId, f64>,
}

impl ForecastTable {
    pub fn validate_and_into_inputs(self) -> anyhow::Result<EngineInputs> {
        ensure!(
            !self.materials.is_empty(),
            "forecast table must contain at least one material"
        );

        let mut out = EngineInputs::default();
        for input in self.materials {
            let label = input.material.trim().to_string();
            let (series, volatility) = input
                .validate_and_into_series()
                .with_context(|| format!("invalid forecast for material {label:?}"))?;

            let material = series.material().clone();
            ensure!(
                !out.series.contains_key(&material),
                "duplicate material in forecast table: {material}"
            );
            if let Some(v) = volatility {
                out.volatility.insert(material.clone(), v);
            }
            out.series.insert(material, series);
        }

        Ok(out)
    }
}

impl MaterialForecastInput {
    fn validate_and_into_series(self) -> anyhow::Result<(ForecastSeries, Option<f64>)> {
        let material = MaterialId::new(&self.material)?;

        if let Some(v) = self.volatility_pct {
            ensure!(
                v.is_finite() && v >= 0.0,
                "volatility_pct must be a non-negative finite number (got {v})"
            );
        }

        let mut points = Vec::with_capacity(self.points.len());
        for p in self.points {
            let period: Period = p.period.parse()?;
            points.push(PricePoint::new(period, p.unit_price));
        }

        let series = ForecastSeries::new(material, points, self.baseline_price)?;
        Ok((series, self.volatility_pct))
    }
}
