use crate::engine::error::{EngineError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Identifier of a tracked commodity (e.g. "Timber").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MaterialId(String);

impl MaterialId {
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(EngineError::invalid("material id must be non-empty"));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MaterialId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MaterialId> for String {
    fn from(value: MaterialId) -> Self {
        value.0
    }
}

impl Borrow<str> for MaterialId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar month. Stored as the first day of the month so ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| EngineError::invalid(format!("invalid period {year}-{month:02}")))
    }

    /// `YYYY-MM`, the wire format.
    pub fn to_iso(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }
}

impl FromStr for Period {
    type Err = EngineError;

    /// Accepts `2025-10`, `2025-10-01`, `Oct 2025` and `October 2025`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .or_else(|_| NaiveDate::parse_from_str(&format!("1 {s}"), "%d %b %Y"))
            .or_else(|_| NaiveDate::parse_from_str(&format!("1 {s}"), "%d %B %Y"))
            .map_err(|_| EngineError::invalid(format!("unrecognised period: {s:?}")))?;
        Self::new(parsed.year(), parsed.month())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%b %Y"))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub period: Period,
    pub unit_price: f64,
}

impl PricePoint {
    pub fn new(period: Period, unit_price: f64) -> Self {
        Self { period, unit_price }
    }
}

/// Chronological monthly price forecast for one material. The first point is the current month.
///
/// Only constructible through [`ForecastSeries::new`] (or deserialization, which goes through the
/// same checks): non-empty, positive finite prices, strictly increasing periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawForecastSeries")]
pub struct ForecastSeries {
    material: MaterialId,
    points: Vec<PricePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    baseline_price: Option<f64>,
}

#[derive(Deserialize)]
struct RawForecastSeries {
    material: MaterialId,
    points: Vec<PricePoint>,
    #[serde(default)]
    baseline_price: Option<f64>,
}

impl TryFrom<RawForecastSeries> for ForecastSeries {
    type Error = EngineError;

    fn try_from(raw: RawForecastSeries) -> Result<Self> {
        Self::new(raw.material, raw.points, raw.baseline_price)
    }
}

impl ForecastSeries {
    pub fn new(
        material: MaterialId,
        points: Vec<PricePoint>,
        baseline_price: Option<f64>,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(EngineError::EmptySeries(material));
        }

        for point in &points {
            ensure_price(&material, point.unit_price, "unit_price")?;
        }
        if let Some(baseline) = baseline_price {
            ensure_price(&material, baseline, "baseline_price")?;
        }

        for pair in points.windows(2) {
            if pair[1].period <= pair[0].period {
                return Err(EngineError::invalid(format!(
                    "{material}: periods must be strictly increasing ({} then {})",
                    pair[0].period, pair[1].period
                )));
            }
        }

        Ok(Self {
            material,
            points,
            baseline_price,
        })
    }

    pub fn material(&self) -> &MaterialId {
        &self.material
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Previous-period reference supplied by the data source, if any.
    pub fn baseline_price(&self) -> Option<f64> {
        self.baseline_price
    }

    pub fn current(&self) -> &PricePoint {
        &self.points[0]
    }

    pub fn price_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).map(|p| p.unit_price)
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.unit_price).collect()
    }

    pub fn max_price(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.unit_price)
            .fold(f64::MIN, f64::max)
    }
}

fn ensure_price(material: &MaterialId, price: f64, field: &str) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(EngineError::invalid(format!(
            "{material}: {field} must be a positive finite number (got {price})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timber() -> MaterialId {
        MaterialId::new("Timber").unwrap()
    }

    fn point(year: i32, month: u32, price: f64) -> PricePoint {
        PricePoint::new(Period::new(year, month).unwrap(), price)
    }

    #[test]
    fn period_parses_iso_and_dashboard_formats() {
        let oct = Period::new(2025, 10).unwrap();
        assert_eq!("2025-10".parse::<Period>().unwrap(), oct);
        assert_eq!("2025-10-01".parse::<Period>().unwrap(), oct);
        assert_eq!("Oct 2025".parse::<Period>().unwrap(), oct);
        assert_eq!("October 2025".parse::<Period>().unwrap(), oct);
        assert!("2025-13".parse::<Period>().is_err());
        assert!("soon".parse::<Period>().is_err());
    }

    #[test]
    fn period_orders_across_year_boundary() {
        let dec = Period::new(2025, 12).unwrap();
        let jan = Period::new(2026, 1).unwrap();
        assert!(dec < jan);
        assert_eq!(jan.to_string(), "Jan 2026");
        assert_eq!(serde_json::to_value(jan).unwrap(), json!("2026-01"));
    }

    #[test]
    fn material_id_is_trimmed_and_non_empty() {
        assert_eq!(MaterialId::new("  Cement ").unwrap().as_str(), "Cement");
        assert!(MaterialId::new("   ").is_err());
        assert!(serde_json::from_value::<MaterialId>(json!("")).is_err());
    }

    #[test]
    fn rejects_empty_series() {
        let err = ForecastSeries::new(timber(), vec![], None).unwrap_err();
        assert_eq!(err, EngineError::EmptySeries(timber()));
    }

    #[test]
    fn rejects_non_monotonic_periods() {
        let points = vec![point(2025, 11, 10.0), point(2025, 10, 11.0)];
        assert!(matches!(
            ForecastSeries::new(timber(), points, None),
            Err(EngineError::InvalidInput(_))
        ));

        let dup = vec![point(2025, 10, 10.0), point(2025, 10, 11.0)];
        assert!(ForecastSeries::new(timber(), dup, None).is_err());
    }

    #[test]
    fn rejects_bad_prices() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(ForecastSeries::new(timber(), vec![point(2025, 10, bad)], None).is_err());
        }
        assert!(ForecastSeries::new(timber(), vec![point(2025, 10, 1.0)], Some(-3.0)).is_err());
    }

    #[test]
    fn deserialize_runs_validation() {
        let ok = json!({
            "material": "Timber",
            "points": [
                {"period": "2025-10", "unit_price": 3812.31},
                {"period": "2025-11", "unit_price": 3833.51}
            ]
        });
        let series: ForecastSeries = serde_json::from_value(ok).unwrap();
        assert_eq!(series.points().len(), 2);
        assert_eq!(series.max_price(), 3833.51);
        assert_eq!(series.baseline_price(), None);

        let empty = json!({"material": "Timber", "points": []});
        assert!(serde_json::from_value::<ForecastSeries>(empty).is_err());
    }
}
