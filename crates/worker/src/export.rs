use anyhow::Context;
use procure_core::domain::recommendation::SnapshotSet;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One CSV row per material.
#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    material: &'a str,
    month: String,
    unit_price: f64,
    action: &'static str,
    savings_per_unit: f64,
    risk_level: &'static str,
    volatility_pct: f64,
}

pub fn write_snapshots_csv<W: Write>(set: &SnapshotSet, out: W) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut rows = 0;
    for snapshot in set.snapshots.values() {
        writer
            .serialize(SnapshotRow {
                material: snapshot.material.as_str(),
                month: snapshot.as_of_period.to_string(),
                unit_price: snapshot.unit_price,
                action: snapshot.action.as_str(),
                savings_per_unit: snapshot.savings_per_unit,
                risk_level: snapshot.risk.level.as_str(),
                volatility_pct: snapshot.risk.volatility_pct,
            })
            .with_context(|| format!("failed to write CSV row for {}", snapshot.material))?;
        rows += 1;
    }
    writer.flush().context("failed to flush CSV output")?;
    Ok(rows)
}

pub fn export_snapshots_csv(set: &SnapshotSet, path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_snapshots_csv(set, file)
}
