//! Wire types for the crime API.
//!
//! Every payload is decoded leniently: the backend aggregates whatever the
//! uploaded CSV contained, so counts and amounts may arrive as floats, as
//! numeric strings, as `null`, or not at all. Anything unparseable
//! collapses to zero instead of failing the whole snapshot.

use serde::{Deserialize, Deserializer};

/// Per-neighborhood crime aggregation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationRecord {
    /// Neighborhood name, unique within one fetch.
    #[serde(default)]
    pub bairro: String,
    /// Number of incidents.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_crimes: u64,
    /// Summed monetary loss (BRL).
    #[serde(default, deserialize_with = "lenient_amount")]
    pub prejuizo_total: f64,
    /// Mean incident latitude.
    #[serde(default)]
    pub latitude_media: Option<f64>,
    /// Mean incident longitude.
    #[serde(default)]
    pub longitude_media: Option<f64>,
}

impl AggregationRecord {
    /// Returns `(lat, lon)` when both coordinates are present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude_media, self.longitude_media) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Neighborhood with the most incidents, as reported by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BairroHighlight {
    #[serde(default)]
    pub bairro: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_crimes: u64,
}

/// Dataset-wide totals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatsSummary {
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_crimes: u64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total_prejuizo: f64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_bairros: u64,
    #[serde(default)]
    pub bairro_mais_crimes: Option<BairroHighlight>,
}

/// Confirmation payload returned by the upload and clear endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub success: Option<bool>,
    /// Server-provided message.
    #[serde(default)]
    pub mensagem: Option<String>,
    /// Rows forwarded for processing (upload only).
    #[serde(default)]
    pub rows_processed: Option<u64>,
    /// Row-level ingestion warnings (upload only).
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Response of the health probe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// The `{ "data": ... }` wrapper every read endpoint uses.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

/// CSV file contents queued for upload.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Number, numeric string, or anything else (0).
fn lenient_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    Ok(lenient_number(&value).filter(|v| *v > 0.0).map_or(0, |v| v as u64))
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(lenient_number(&value).unwrap_or(0.0))
}
