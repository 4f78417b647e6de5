//! Regulatory compliance provider.
//!
//! Serves compliance monitoring results for nitrate, nitrite, arsenic,
//! disinfection byproducts and fluoride, plus a PFAS and E. coli view used
//! when the live feeds are switched off. The dataset is held in memory
//! until the state compliance feed is integrated; this provider never
//! emits advisories.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::ingest::SourceAdapter;
use crate::model::{
    Contaminant, NormalizedSeries, RegionKind, SamplePoint, SeriesQuery, Status, WaterError,
};
use crate::thresholds::profile_for;

pub const SOURCE_NAME: &str = "Drinking water compliance monitoring";

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One compliance monitoring result.
pub struct ComplianceRecord {
    pub contaminant: Contaminant,
    pub system_id: &'static str,
    pub system_name: &'static str,
    pub county: &'static str,
    /// Sub-measure within the contaminant family (e.g. `TTHM` or `HAA5`).
    pub kind: Option<&'static str>,
    /// ISO date, `YYYY-MM-DD`.
    pub date: &'static str,
    pub value: Option<f64>,
}

const DMWW: (&str, &str, &str) = ("IA7727010", "Des Moines Water Works", "Polk");
const CEDAR_RAPIDS: (&str, &str, &str) = ("IA5727009", "Cedar Rapids Water Dept", "Linn");
const IOWA_CITY: (&str, &str, &str) = ("IA5276003", "Iowa City Water", "Johnson");

const fn record(
    contaminant: Contaminant,
    system: (&'static str, &'static str, &'static str),
    kind: Option<&'static str>,
    date: &'static str,
    value: Option<f64>,
) -> ComplianceRecord {
    ComplianceRecord {
        contaminant,
        system_id: system.0,
        system_name: system.1,
        county: system.2,
        kind,
        date,
        value,
    }
}

pub static COMPLIANCE_DATASET: &[ComplianceRecord] = &[
    record(Contaminant::Nitrate, DMWW, None, "2024-01-15", Some(4.8)),
    record(Contaminant::Nitrate, DMWW, None, "2024-03-12", Some(6.2)),
    record(Contaminant::Nitrate, DMWW, None, "2024-05-01", Some(7.1)),
    record(Contaminant::Nitrate, CEDAR_RAPIDS, None, "2024-02-20", Some(3.9)),
    record(Contaminant::Nitrate, CEDAR_RAPIDS, None, "2024-05-08", Some(5.4)),
    record(Contaminant::Nitrite, DMWW, None, "2024-02-01", Some(0.05)),
    record(Contaminant::Nitrite, DMWW, None, "2024-05-01", None),
    record(Contaminant::Nitrite, CEDAR_RAPIDS, None, "2024-04-10", Some(0.02)),
    record(Contaminant::Arsenic, DMWW, None, "2023-08-22", Some(1.3)),
    record(Contaminant::Arsenic, IOWA_CITY, None, "2023-11-07", Some(2.6)),
    record(Contaminant::Dbp, DMWW, Some("TTHM"), "2024-01-10", Some(41.0)),
    record(Contaminant::Dbp, DMWW, Some("HAA5"), "2024-01-10", Some(22.0)),
    record(Contaminant::Dbp, DMWW, Some("TTHM"), "2024-04-09", Some(63.0)),
    record(Contaminant::Dbp, CEDAR_RAPIDS, Some("TTHM"), "2024-04-16", Some(38.0)),
    record(Contaminant::Fluoride, DMWW, None, "2024-03-05", Some(0.7)),
    record(Contaminant::Fluoride, IOWA_CITY, None, "2024-03-19", Some(0.68)),
    record(Contaminant::Pfas, IOWA_CITY, None, "2024-01-09", Some(2.2)),
    record(Contaminant::Pfas, DMWW, None, "2024-02-14", Some(1.0)),
    record(Contaminant::Ecoli, DMWW, None, "2024-05-01", Some(0.0)),
];

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Builds a series from dataset rows for one contaminant. Rows are filtered
/// to `query.system_id` when it matches anything, otherwise all rows for the
/// contaminant are used. Rows with unparseable dates are skipped.
pub fn build_series(
    dataset: &[ComplianceRecord],
    contaminant: Contaminant,
    query: &SeriesQuery,
) -> Result<Option<NormalizedSeries>, WaterError> {
    let profile = profile_for(contaminant)?;
    let threshold = profile.metadata();

    let for_contaminant: Vec<(&ComplianceRecord, NaiveDate)> = dataset
        .iter()
        .filter(|r| r.contaminant == contaminant)
        .filter_map(|r| NaiveDate::parse_from_str(r.date, "%Y-%m-%d").ok().map(|d| (r, d)))
        .collect();

    let mut used: Vec<(&ComplianceRecord, NaiveDate)> = match query.system_id.as_deref() {
        Some(id) => for_contaminant
            .iter()
            .filter(|(r, _)| r.system_id.eq_ignore_ascii_case(id.trim()))
            .copied()
            .collect(),
        None => Vec::new(),
    };
    if used.is_empty() {
        used = for_contaminant;
    }

    used.sort_by_key(|(_, date)| *date);
    let Some((latest, _)) = used.last().copied() else {
        return Ok(None);
    };

    Ok(Some(NormalizedSeries {
        contaminant,
        metric: profile.metric.to_string(),
        unit: threshold.unit.clone(),
        source: SOURCE_NAME.to_string(),
        source_url: None,
        updated_at: Utc::now(),
        region_label: latest.system_name.to_string(),
        region_kind: RegionKind::System,
        system_id: Some(latest.system_id.to_string()),
        county: Some(latest.county.to_string()),
        points: used.iter().map(|(r, date)| SamplePoint::new(*date, r.value)).collect(),
        status: Status::Unknown,
        status_reason: None,
        threshold,
        advisories: Vec::new(),
    }))
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct ComplianceAdapter {
    dataset: &'static [ComplianceRecord],
}

impl ComplianceAdapter {
    pub fn new() -> Self {
        Self { dataset: COMPLIANCE_DATASET }
    }

    pub fn with_dataset(dataset: &'static [ComplianceRecord]) -> Self {
        Self { dataset }
    }
}

impl Default for ComplianceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for ComplianceAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn resolve(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        build_series(self.dataset, contaminant, query)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
