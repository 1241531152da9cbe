use crate::domain::material::{ForecastSeries, MaterialId, Period};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symmetric pairwise price correlation. `cells[i][j]` pairs `materials[i]` with `materials[j]`;
/// `None` marks a pair with too little overlap (or no variance) to correlate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub materials: Vec<MaterialId>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.materials.iter().position(|m| m.as_str() == a)?;
        let j = self.materials.iter().position(|m| m.as_str() == b)?;
        self.cells[i][j]
    }
}

pub fn correlate(materials: &BTreeMap<MaterialId, ForecastSeries>) -> CorrelationMatrix {
    let ids: Vec<MaterialId> = materials.keys().cloned().collect();
    let by_period: Vec<BTreeMap<Period, f64>> = materials
        .values()
        .map(|s| s.points().iter().map(|p| (p.period, p.unit_price)).collect())
        .collect();

    let n = ids.len();
    let mut cells = vec![vec![None; n]; n];
    for i in 0..n {
        cells[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let r = overlapping_pearson(&by_period[i], &by_period[j]);
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    CorrelationMatrix {
        materials: ids,
        cells,
    }
}

fn overlapping_pearson(a: &BTreeMap<Period, f64>, b: &BTreeMap<Period, f64>) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .filter_map(|(period, x)| b.get(period).map(|y| (*x, *y)))
        .unzip();
    pearson(&xs, &ys)
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x < 1e-12 || var_y < 1e-12 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
