//! Beach monitoring feed client.
//!
//! Retrieves per-sample E. coli results for public swimming beaches. The
//! feed is a flat JSON array whose field names drift between seasons and
//! publishing tools (`beach` vs `site_name`, `sample_date` vs `date`, ...),
//! and some exports wrap each row in an `attributes` object. Rows are
//! decoded one at a time; rows without a usable date or reading are dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::alert::advisories::advisory_id;
use crate::ingest::{
    LooseValue, SourceAdapter, contains_ignore_case, fetch_records, first_date, first_number,
    first_text,
};
use crate::model::{
    Advisory, AdvisoryType, Contaminant, NormalizedSeries, RegionKind, SamplePoint, SeriesQuery,
    Severity, Status, ThresholdMetadata, WaterError,
};
use crate::thresholds::profile_for;

pub const SOURCE_NAME: &str = "Beach monitoring program";

const UNNAMED_SITE: &str = "Unnamed beach";

// ============================================================================
// Feed record shapes
// ============================================================================

/// One feed row under any of the field spellings seen upstream.
///
/// Every spelling is its own field so that a row carrying two of them still
/// decodes; the accessors below pick the first usable one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBeachRecord {
    pub site: Option<LooseValue>,
    pub site_name: Option<LooseValue>,
    #[serde(rename = "siteName")]
    pub site_name_camel: Option<LooseValue>,
    pub beach: Option<LooseValue>,
    pub beach_name: Option<LooseValue>,
    pub location: Option<LooseValue>,

    pub date: Option<LooseValue>,
    pub sample_date: Option<LooseValue>,
    #[serde(rename = "sampleDate")]
    pub sample_date_camel: Option<LooseValue>,
    pub sampled_at: Option<LooseValue>,
    pub collection_date: Option<LooseValue>,

    pub ecoli: Option<LooseValue>,
    pub e_coli: Option<LooseValue>,
    #[serde(rename = "eColi")]
    pub e_coli_camel: Option<LooseValue>,
    pub ecoli_cfu: Option<LooseValue>,
    pub ecoli_mpn: Option<LooseValue>,
    pub result: Option<LooseValue>,

    pub advisory: Option<LooseValue>,
    pub advisory_flag: Option<LooseValue>,
    pub swim_advisory: Option<LooseValue>,
    #[serde(rename = "advisoryPosted")]
    pub advisory_posted: Option<LooseValue>,
    pub posted: Option<LooseValue>,

    pub county: Option<LooseValue>,
}

impl RawBeachRecord {
    fn site_label(&self) -> Option<String> {
        first_text([
            &self.site,
            &self.site_name,
            &self.site_name_camel,
            &self.beach,
            &self.beach_name,
            &self.location,
        ])
    }

    fn sample_date(&self) -> Option<NaiveDate> {
        first_date([
            &self.date,
            &self.sample_date,
            &self.sample_date_camel,
            &self.sampled_at,
            &self.collection_date,
        ])
    }

    fn reading(&self) -> Option<f64> {
        first_number([
            &self.ecoli,
            &self.e_coli,
            &self.e_coli_camel,
            &self.ecoli_cfu,
            &self.ecoli_mpn,
            &self.result,
        ])
    }

    fn flagged(&self) -> bool {
        [
            &self.advisory,
            &self.advisory_flag,
            &self.swim_advisory,
            &self.advisory_posted,
            &self.posted,
        ]
        .into_iter()
        .flatten()
        .any(LooseValue::as_flag)
    }
}

/// The record layouts the feed has been published in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BeachRecordShape {
    /// Feature-service export: `{ "attributes": { ... } }`.
    Feature { attributes: RawBeachRecord },
    Flat(RawBeachRecord),
}

impl BeachRecordShape {
    fn into_record(self) -> RawBeachRecord {
        match self {
            BeachRecordShape::Feature { attributes } => attributes,
            BeachRecordShape::Flat(record) => record,
        }
    }
}

/// Canonical beach sample after tolerant decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct BeachSample {
    pub site: String,
    pub date: NaiveDate,
    pub value: f64,
    pub advisory: bool,
    pub county: Option<String>,
}

// ============================================================================
// Decoding
// ============================================================================

/// Coerces one raw row. A row is flagged as an advisory when upstream says
/// so or when its reading is at or above `alert_level`.
pub fn normalize_record(record: RawBeachRecord, alert_level: Option<f64>) -> Option<BeachSample> {
    let date = record.sample_date()?;
    let value = record.reading()?;
    let over_limit = alert_level.is_some_and(|alert| value >= alert);

    Some(BeachSample {
        site: record.site_label().unwrap_or_else(|| UNNAMED_SITE.to_string()),
        date,
        value,
        advisory: record.flagged() || over_limit,
        county: record.county.as_ref().and_then(LooseValue::as_text),
    })
}

/// Decodes every row that can be coerced, dropping the rest.
pub fn decode_records(records: &[serde_json::Value], alert_level: Option<f64>) -> Vec<BeachSample> {
    let samples: Vec<BeachSample> = records
        .iter()
        .filter_map(|raw| serde_json::from_value::<BeachRecordShape>(raw.clone()).ok())
        .filter_map(|shape| normalize_record(shape.into_record(), alert_level))
        .collect();

    let dropped = records.len() - samples.len();
    if dropped > 0 {
        debug!(source = SOURCE_NAME, dropped, kept = samples.len(), "Discarded undecodable beach rows");
    }
    samples
}

/// Most frequent site label; ties go to the alphabetically first label.
pub fn representative_site(samples: &[BeachSample]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sample in samples {
        *counts.entry(sample.site.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_site, a_n), (b_site, b_n)| a_n.cmp(b_n).then_with(|| b_site.cmp(a_site)))
        .map(|(site, _)| site.to_string())
}

// ============================================================================
// Normalization
// ============================================================================

/// Builds the E. coli series for `query` from decoded samples.
///
/// When a site is requested, only rows whose site contains it
/// (case-insensitively) are used; if none match, the whole feed is used.
/// Returns `None` when there is nothing to build from.
pub fn build_series(
    samples: Vec<BeachSample>,
    query: &SeriesQuery,
    threshold: &ThresholdMetadata,
    metric: &str,
    source_url: Option<&str>,
    fetched_at: DateTime<Utc>,
) -> Option<NormalizedSeries> {
    let mut used: Vec<BeachSample> = match query.site.as_deref() {
        Some(site) => samples
            .iter()
            .filter(|s| contains_ignore_case(&s.site, site))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    if used.is_empty() {
        used = samples;
    }
    if used.is_empty() {
        return None;
    }

    used.sort_by_key(|s| s.date);
    let region = representative_site(&used)?;
    let county = used
        .iter()
        .rev()
        .find(|s| s.site == region)
        .and_then(|s| s.county.clone());

    let advisories = used
        .iter()
        .filter(|s| s.advisory)
        .map(|s| swim_advisory(s, threshold, source_url))
        .collect();

    Some(NormalizedSeries {
        contaminant: Contaminant::Ecoli,
        metric: metric.to_string(),
        unit: threshold.unit.clone(),
        source: SOURCE_NAME.to_string(),
        source_url: source_url.map(String::from),
        updated_at: fetched_at,
        region_label: region,
        region_kind: RegionKind::Site,
        system_id: None,
        county,
        points: used.iter().map(|s| SamplePoint::new(s.date, Some(s.value))).collect(),
        status: Status::Unknown,
        status_reason: None,
        threshold: threshold.clone(),
        advisories,
    })
}

/// Synthesized from a reading, so it stays below `Status::Alert`: the
/// reading itself decides the series status.
fn swim_advisory(sample: &BeachSample, threshold: &ThresholdMetadata, source_url: Option<&str>) -> Advisory {
    Advisory {
        id: advisory_id(Contaminant::Ecoli, &sample.site, sample.date),
        advisory_type: AdvisoryType::Swim,
        contaminant: Contaminant::Ecoli,
        title: format!("Swim advisory at {}", sample.site),
        summary: format!(
            "E. coli measured {} {} on {}. {}",
            sample.value,
            threshold.unit,
            sample.date.format("%Y-%m-%d"),
            threshold.alert_copy
        ),
        issued_at: sample.date.and_time(chrono::NaiveTime::MIN).and_utc(),
        expires_at: None,
        severity: Severity::Alert,
        status: Status::Warn,
        affected_systems: Vec::new(),
        source: SOURCE_NAME.to_string(),
        source_url: source_url.map(String::from),
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Live adapter over the beach monitoring feed (E. coli only).
pub struct BeachAdapter {
    client: reqwest::Client,
    url: String,
}

impl BeachAdapter {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }
}

#[async_trait]
impl SourceAdapter for BeachAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn resolve(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        if contaminant != Contaminant::Ecoli {
            return Err(WaterError::Configuration(format!(
                "{} does not report {}",
                SOURCE_NAME, contaminant
            )));
        }
        let profile = profile_for(contaminant)?;
        let threshold = profile.metadata();

        let records = fetch_records(&self.client, &self.url).await?;
        let samples = decode_records(&records, threshold.alert_level);
        Ok(build_series(samples, query, &threshold, profile.metric, Some(&self.url), Utc::now()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ecoli_threshold() -> ThresholdMetadata {
        crate::thresholds::threshold_for(Contaminant::Ecoli).unwrap()
    }

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn mixed_feed() -> Vec<serde_json::Value> {
        vec![
            json!({ "beach": "Big Creek Beach", "sample_date": "2024-06-03", "ecoli": 40 }),
            json!({ "site_name": "Lake Macbride Beach", "date": "06/03/2024", "e_coli": "20" }),
            json!({ "attributes": { "beach_name": "Big Creek Beach", "sampleDate": "2024-05-27", "result": "<10" } }),
            json!({ "site": "Lake Macbride Beach", "sampled_at": "2024-05-27T09:15:00", "ecoli_cfu": 310, "advisory": "Y" }),
            json!({ "beach": "Big Creek Beach", "sample_date": "not a date", "ecoli": 55 }),
            json!({ "beach": "Big Creek Beach", "sample_date": "2024-06-05" }),
        ]
    }

    #[test]
    fn test_decode_handles_aliases_and_drops_bad_rows() {
        let samples = decode_records(&mixed_feed(), Some(235.0));
        assert_eq!(samples.len(), 4, "rows without a date or reading must be dropped");
        assert!(samples.iter().any(|s| s.site == "Lake Macbride Beach" && s.value == 20.0));
        assert!(samples.iter().any(|s| s.site == "Big Creek Beach" && s.value == 10.0));
    }

    #[test]
    fn test_site_filter_is_case_insensitive_substring() {
        let samples = decode_records(&mixed_feed(), Some(235.0));
        let query = SeriesQuery::for_site("big creek");
        let series = build_series(samples, &query, &ecoli_threshold(), "E. coli", None, fetched_at())
            .expect("big creek rows exist");

        assert_eq!(series.region_label, "Big Creek Beach");
        assert_eq!(series.region_kind, RegionKind::Site);
        assert_eq!(series.points.len(), 2);
        assert!(series.advisories.is_empty(), "Big Creek has no flagged rows");
    }

    #[test]
    fn test_points_are_sorted_ascending() {
        let samples = decode_records(&mixed_feed(), Some(235.0));
        let series = build_series(
            samples,
            &SeriesQuery::for_site("Big Creek"),
            &ecoli_threshold(),
            "E. coli",
            None,
            fetched_at(),
        )
        .unwrap();
        let dates: Vec<_> = series.points.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-05-27", "2024-06-03"]);
    }

    #[test]
    fn test_unmatched_site_falls_back_to_whole_feed() {
        let samples = decode_records(&mixed_feed(), Some(235.0));
        let series = build_series(
            samples,
            &SeriesQuery::for_site("Clear Lake"),
            &ecoli_threshold(),
            "E. coli",
            None,
            fetched_at(),
        )
        .expect("fallback to unfiltered rows");
        assert_eq!(series.points.len(), 4);
    }

    #[test]
    fn test_flagged_row_becomes_swim_advisory() {
        let samples = decode_records(&mixed_feed(), Some(235.0));
        let series = build_series(
            samples,
            &SeriesQuery::for_site("macbride"),
            &ecoli_threshold(),
            "E. coli",
            None,
            fetched_at(),
        )
        .unwrap();
        assert_eq!(series.advisories.len(), 1);
        let advisory = &series.advisories[0];
        assert_eq!(advisory.advisory_type, AdvisoryType::Swim);
        assert_eq!(advisory.severity, Severity::Alert);
        assert_eq!(advisory.id, "ecoli-lake-macbride-beach-2024-05-27");
    }

    #[test]
    fn test_row_with_several_spellings_of_one_field_still_decodes() {
        let records = vec![
            json!({ "beach": "Big Creek", "site_name": "Big Creek Beach", "sample_date": "2024-06-03", "ecoli": 40 }),
            json!({ "beach": "Union Grove", "date": "", "sampleDate": "2024-06-04", "ecoli": "ND", "result": "12", "posted": "N", "advisory_flag": "Y" }),
        ];
        let samples = decode_records(&records, Some(235.0));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].site, "Big Creek Beach");
        assert_eq!(samples[0].value, 40.0);
        assert_eq!(samples[1].date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(samples[1].value, 12.0);
        assert!(samples[1].advisory);
    }

    #[test]
    fn test_past_swim_advisory_does_not_pin_series_at_alert() {
        use crate::alert::status::apply_evaluation;
        use crate::model::StatusReason;

        let samples = decode_records(&mixed_feed(), Some(235.0));
        let threshold = ecoli_threshold();
        let series = build_series(samples, &SeriesQuery::for_site("macbride"), &threshold, "E. coli", None, fetched_at())
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap();
        let series = apply_evaluation(series, &threshold, now);

        assert_eq!(series.advisories.len(), 1);
        assert_eq!(series.advisories[0].status, Status::Warn);
        assert_eq!(series.status, Status::Safe);
        assert_eq!(series.status_reason, Some(StatusReason::Value));
    }

    #[test]
    fn test_reading_over_alert_level_is_flagged_without_upstream_flag() {
        let records = vec![json!({ "beach": "Union Grove", "date": "2024-06-01", "ecoli": 2400 })];
        let samples = decode_records(&records, Some(235.0));
        assert!(samples[0].advisory);
    }

    #[test]
    fn test_missing_site_gets_placeholder_label() {
        let records = vec![json!({ "date": "2024-06-01", "ecoli": 12 })];
        let samples = decode_records(&records, Some(235.0));
        assert_eq!(samples[0].site, UNNAMED_SITE);
    }

    #[test]
    fn test_empty_feed_builds_nothing() {
        let series = build_series(Vec::new(), &SeriesQuery::default(), &ecoli_threshold(), "E. coli", None, fetched_at());
        assert!(series.is_none());
    }

    #[test]
    fn test_representative_site_prefers_most_common_then_alphabetical() {
        let sample = |site: &str| BeachSample {
            site: site.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            value: 1.0,
            advisory: false,
            county: None,
        };
        let samples = vec![sample("B"), sample("A"), sample("B")];
        assert_eq!(representative_site(&samples).as_deref(), Some("B"));

        let tied = vec![sample("B"), sample("A")];
        assert_eq!(representative_site(&tied).as_deref(), Some("A"));
    }

    #[test]
    #[ignore] // Depends on an external feed configured in WQMON_BEACH_FEED_URL
    fn beach_feed_returns_decodable_rows() {
        let url = std::env::var("WQMON_BEACH_FEED_URL").expect("set WQMON_BEACH_FEED_URL");
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let records = runtime
            .block_on(fetch_records(&reqwest::Client::new(), &url))
            .expect("feed should respond");
        assert!(!decode_records(&records, Some(235.0)).is_empty());
    }
}
