//! PFAS survey feed client.
//!
//! The survey publishes one row per sample, keyed by public water system
//! id, through a bulk unparameterized endpoint. Filtering to a system
//! happens here. When the newest sample for the system is at or above the
//! alert level, a single PFAS notice is attached to the series.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::alert::advisories::advisory_id;
use crate::ingest::{LooseValue, SourceAdapter, fetch_records, first_date, first_number, first_text};
use crate::model::{
    Advisory, AdvisoryType, Contaminant, NormalizedSeries, RegionKind, SamplePoint, SeriesQuery,
    Severity, Status, ThresholdMetadata, WaterError,
};
use crate::thresholds::profile_for;

pub const SOURCE_NAME: &str = "PFAS sampling survey";

// ============================================================================
// Feed records
// ============================================================================

/// One survey row. Each upstream spelling is a separate field so rows that
/// carry more than one of them still decode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPfasRecord {
    pub system_id: Option<LooseValue>,
    pub pwsid: Option<LooseValue>,
    pub pws_id: Option<LooseValue>,
    #[serde(rename = "systemId")]
    pub system_id_camel: Option<LooseValue>,

    pub system_name: Option<LooseValue>,
    pub pws_name: Option<LooseValue>,
    #[serde(rename = "systemName")]
    pub system_name_camel: Option<LooseValue>,
    pub name: Option<LooseValue>,

    pub date: Option<LooseValue>,
    pub sample_date: Option<LooseValue>,
    #[serde(rename = "sampleDate")]
    pub sample_date_camel: Option<LooseValue>,
    pub collection_date: Option<LooseValue>,

    pub value: Option<LooseValue>,
    pub result: Option<LooseValue>,
    pub total_pfas: Option<LooseValue>,
    pub concentration: Option<LooseValue>,
    pub ppt: Option<LooseValue>,

    pub county: Option<LooseValue>,
}

/// Canonical PFAS sample after tolerant decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct PfasSample {
    pub system_id: String,
    pub system_name: Option<String>,
    pub date: NaiveDate,
    pub value: f64,
    pub county: Option<String>,
}

/// Coerces one row; a system id, a date and a reading are all required.
pub fn normalize_record(record: RawPfasRecord) -> Option<PfasSample> {
    Some(PfasSample {
        system_id: first_text([
            &record.system_id,
            &record.pwsid,
            &record.pws_id,
            &record.system_id_camel,
        ])?,
        system_name: first_text([
            &record.system_name,
            &record.pws_name,
            &record.system_name_camel,
            &record.name,
        ]),
        date: first_date([
            &record.date,
            &record.sample_date,
            &record.sample_date_camel,
            &record.collection_date,
        ])?,
        value: first_number([
            &record.value,
            &record.result,
            &record.total_pfas,
            &record.concentration,
            &record.ppt,
        ])?,
        county: record.county.as_ref().and_then(LooseValue::as_text),
    })
}

pub fn decode_records(records: &[serde_json::Value]) -> Vec<PfasSample> {
    let samples: Vec<PfasSample> = records
        .iter()
        .filter_map(|raw| serde_json::from_value::<RawPfasRecord>(raw.clone()).ok())
        .filter_map(normalize_record)
        .collect();

    let dropped = records.len() - samples.len();
    if dropped > 0 {
        debug!(source = SOURCE_NAME, dropped, kept = samples.len(), "Discarded undecodable PFAS rows");
    }
    samples
}

// ============================================================================
// Normalization
// ============================================================================

/// Builds the PFAS series for `query.system_id`, or for the whole survey
/// when no system is requested or none of its rows match.
pub fn build_series(
    samples: Vec<PfasSample>,
    query: &SeriesQuery,
    threshold: &ThresholdMetadata,
    metric: &str,
    source_url: Option<&str>,
    fetched_at: DateTime<Utc>,
) -> Option<NormalizedSeries> {
    let mut used: Vec<PfasSample> = match query.system_id.as_deref() {
        Some(id) => samples
            .iter()
            .filter(|s| s.system_id.eq_ignore_ascii_case(id.trim()))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    if used.is_empty() {
        used = samples;
    }

    used.sort_by_key(|s| s.date);
    let latest = used.last()?.clone();

    let mut advisories = Vec::new();
    if threshold.alert_level.is_some_and(|alert| latest.value >= alert) {
        advisories.push(pfas_notice(&latest, threshold, source_url));
    }

    Some(NormalizedSeries {
        contaminant: Contaminant::Pfas,
        metric: metric.to_string(),
        unit: threshold.unit.clone(),
        source: SOURCE_NAME.to_string(),
        source_url: source_url.map(String::from),
        updated_at: fetched_at,
        region_label: latest.system_name.clone().unwrap_or_else(|| latest.system_id.clone()),
        region_kind: RegionKind::System,
        system_id: Some(latest.system_id.clone()),
        county: latest.county.clone(),
        points: used.iter().map(|s| SamplePoint::new(s.date, Some(s.value))).collect(),
        status: Status::Unknown,
        status_reason: None,
        threshold: threshold.clone(),
        advisories,
    })
}

/// Synthesized from a reading, so it stays below `Status::Alert`: the
/// reading itself decides the series status.
fn pfas_notice(sample: &PfasSample, threshold: &ThresholdMetadata, source_url: Option<&str>) -> Advisory {
    let label = sample.system_name.as_deref().unwrap_or(&sample.system_id);
    Advisory {
        id: advisory_id(Contaminant::Pfas, &sample.system_id, sample.date),
        advisory_type: AdvisoryType::Pfas,
        contaminant: Contaminant::Pfas,
        title: format!("PFAS above federal limit: {}", label),
        summary: format!(
            "Most recent PFAS sample ({}) measured {} {}. {}",
            sample.date.format("%Y-%m-%d"),
            sample.value,
            threshold.unit,
            threshold.alert_copy
        ),
        issued_at: sample.date.and_time(chrono::NaiveTime::MIN).and_utc(),
        expires_at: None,
        severity: Severity::Alert,
        status: Status::Warn,
        affected_systems: vec![sample.system_id.clone()],
        source: SOURCE_NAME.to_string(),
        source_url: source_url.map(String::from),
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Live adapter over the PFAS survey feed.
pub struct PfasSurveyAdapter {
    client: reqwest::Client,
    url: String,
}

impl PfasSurveyAdapter {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }
}

#[async_trait]
impl SourceAdapter for PfasSurveyAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn resolve(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        if contaminant != Contaminant::Pfas {
            return Err(WaterError::Configuration(format!(
                "{} does not report {}",
                SOURCE_NAME, contaminant
            )));
        }
        let profile = profile_for(contaminant)?;
        let threshold = profile.metadata();

        let records = fetch_records(&self.client, &self.url).await?;
        Ok(build_series(
            decode_records(&records),
            query,
            &threshold,
            profile.metric,
            Some(&self.url),
            Utc::now(),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
