//! Core data types for the water-quality monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! contaminants, sample points, normalized series, advisories, and the error
//! type. It contains no I/O and no decision logic.
//!
//! Field names serialize in camelCase because cache snapshot files are written
//! by the fixture generator in that shape and read back verbatim.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contaminants
// ---------------------------------------------------------------------------

/// The closed set of regulated contaminants tracked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contaminant {
    Nitrate,
    Nitrite,
    Ecoli,
    Pfas,
    Arsenic,
    Dbp,
    Fluoride,
}

impl Contaminant {
    /// All contaminants, in the order collections are reported.
    pub const ALL: [Contaminant; 7] = [
        Contaminant::Nitrate,
        Contaminant::Nitrite,
        Contaminant::Ecoli,
        Contaminant::Pfas,
        Contaminant::Arsenic,
        Contaminant::Dbp,
        Contaminant::Fluoride,
    ];

    /// Stable identifier used in cache file names, URLs and advisory ids.
    pub fn slug(self) -> &'static str {
        match self {
            Contaminant::Nitrate => "nitrate",
            Contaminant::Nitrite => "nitrite",
            Contaminant::Ecoli => "ecoli",
            Contaminant::Pfas => "pfas",
            Contaminant::Arsenic => "arsenic",
            Contaminant::Dbp => "dbp",
            Contaminant::Fluoride => "fluoride",
        }
    }
}

impl fmt::Display for Contaminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Contaminant {
    type Err = WaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_', '.', ' '], "");
        Contaminant::ALL
            .into_iter()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| WaterError::Configuration(format!("unsupported contaminant: {}", s)))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Safety classification, in ascending order of severity.
///
/// The derived ordering is load-bearing: staleness escalation compares
/// statuses with `<`, so variants must stay declared `Unknown < Safe < Warn < Alert`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Safe,
    Warn,
    Alert,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Safe => write!(f, "safe"),
            Status::Warn => write!(f, "warn"),
            Status::Alert => write!(f, "alert"),
        }
    }
}

/// Why a series received its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusReason {
    Advisory,
    NoData,
    Value,
    Stale,
}

// ---------------------------------------------------------------------------
// Samples and thresholds
// ---------------------------------------------------------------------------

/// One dated measurement. `value` is absent when the sample was taken but
/// produced no usable reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
    /// Per-point classification for display; filled in by the evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl SamplePoint {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value, status: None }
    }
}

/// Regulatory and advisory thresholds for one contaminant.
///
/// Levels are expressed in `unit`. When both are present, `warn_level <= alert_level`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdMetadata {
    pub unit: String,
    #[serde(default)]
    pub mcl: Option<f64>,
    #[serde(default)]
    pub health_advisory: Option<f64>,
    #[serde(default)]
    pub warn_level: Option<f64>,
    #[serde(default)]
    pub alert_level: Option<f64>,
    #[serde(default)]
    pub freshness_days: Option<u32>,
    #[serde(default)]
    pub safe_copy: String,
    #[serde(default)]
    pub warn_copy: String,
    #[serde(default)]
    pub alert_copy: String,
}

// ---------------------------------------------------------------------------
// Advisories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryType {
    Boil,
    Swim,
    Pfas,
}

impl FromStr for AdvisoryType {
    type Err = WaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boil" => Ok(AdvisoryType::Boil),
            "swim" => Ok(AdvisoryType::Swim),
            "pfas" => Ok(AdvisoryType::Pfas),
            other => Err(WaterError::Validation(format!("unknown advisory type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Alert,
}

/// A notice that can override value-based status (boil order, swim
/// advisory, PFAS notice). Advisories are emitted by adapters while
/// normalizing and are never persisted on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory {
    /// Normalized slug of contaminant + region + sample date; the dedup key.
    pub id: String,
    #[serde(rename = "type")]
    pub advisory_type: AdvisoryType,
    pub contaminant: Contaminant,
    pub title: String,
    pub summary: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_systems: Vec<String>,
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    System,
    Site,
}

/// The common time-series shape every source is normalized into.
///
/// Points are ordered by ascending date; adapters maintain this, consumers
/// rely on it. `status` is only meaningful after the evaluator has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSeries {
    pub contaminant: Contaminant,
    pub metric: String,
    pub unit: String,
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub region_label: String,
    pub region_kind: RegionKind,
    #[serde(default)]
    pub system_id: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    pub points: Vec<SamplePoint>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_reason: Option<StatusReason>,
    #[serde(default)]
    pub threshold: ThresholdMetadata,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
}

/// Filters accepted by series resolution. Not every adapter honors every
/// field; `zip` and `kind` are carried for callers but not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesQuery {
    pub system_id: Option<String>,
    pub zip: Option<String>,
    pub county: Option<String>,
    pub site: Option<String>,
    pub kind: Option<String>,
}

impl SeriesQuery {
    pub fn for_system(system_id: &str) -> Self {
        Self { system_id: Some(system_id.to_string()), ..Self::default() }
    }

    pub fn for_site(site: &str) -> Self {
        Self { site: Some(site.to_string()), ..Self::default() }
    }
}

/// Output envelope for a collection request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesCollection {
    pub data: Vec<NormalizedSeries>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while resolving water-quality data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaterError {
    /// Transport failure or non-2xx response from a live source.
    #[error("Network error: {0}")]
    Network(String),
    /// The live call did not finish inside the fixed timeout.
    #[error("Timeout: {source_name} did not respond within {seconds}s")]
    Timeout { source_name: String, seconds: u64 },
    /// An upstream payload or cache file did not coerce to the expected shape.
    #[error("Validation error: {0}")]
    Validation(String),
    /// No data exists after exhausting live and cache sources.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Unsupported contaminant or unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for WaterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WaterError::Validation(err.to_string())
        } else {
            WaterError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WaterError {
    fn from(err: serde_json::Error) -> Self {
        WaterError::Validation(err.to_string())
    }
}

impl From<toml::de::Error> for WaterError {
    fn from(err: toml::de::Error) -> Self {
        WaterError::Configuration(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering_matches_escalation_ladder() {
        assert!(Status::Unknown < Status::Safe);
        assert!(Status::Safe < Status::Warn);
        assert!(Status::Warn < Status::Alert);
    }

    #[test]
    fn test_contaminant_parses_loose_spellings() {
        assert_eq!("E. coli".parse::<Contaminant>().unwrap(), Contaminant::Ecoli);
        assert_eq!("e-coli".parse::<Contaminant>().unwrap(), Contaminant::Ecoli);
        assert_eq!("PFAS".parse::<Contaminant>().unwrap(), Contaminant::Pfas);
        assert!(matches!(
            "lead".parse::<Contaminant>(),
            Err(WaterError::Configuration(_))
        ));
    }

    #[test]
    fn test_snapshot_without_status_deserializes_as_unknown() {
        let json = r#"{
            "contaminant": "nitrate",
            "metric": "Nitrate (as N)",
            "unit": "mg/L",
            "source": "fixture",
            "updatedAt": "2024-05-01T00:00:00Z",
            "regionLabel": "Des Moines Water Works",
            "regionKind": "system",
            "points": [{ "date": "2024-05-01", "value": 7.1 }]
        }"#;
        let series: NormalizedSeries = serde_json::from_str(json).expect("snapshot should parse");
        assert_eq!(series.status, Status::Unknown);
        assert!(series.advisories.is_empty());
        assert_eq!(series.points[0].value, Some(7.1));
        assert_eq!(series.points[0].status, None);
    }

    #[test]
    fn test_advisory_type_serializes_under_type_key() {
        let advisory = Advisory {
            id: "pfas-ia7727010-2024-05-01".to_string(),
            advisory_type: AdvisoryType::Pfas,
            contaminant: Contaminant::Pfas,
            title: "t".to_string(),
            summary: "s".to_string(),
            issued_at: "2024-05-01T00:00:00Z".parse().unwrap(),
            expires_at: None,
            severity: Severity::Alert,
            status: Status::Alert,
            affected_systems: vec!["IA7727010".to_string()],
            source: "PFAS survey".to_string(),
            source_url: None,
        };
        let value = serde_json::to_value(&advisory).unwrap();
        assert_eq!(value["type"], "pfas");
        assert_eq!(value["affectedSystems"][0], "IA7727010");
    }
}
