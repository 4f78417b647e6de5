//! Series resolution with live → cache fallback.
//!
//! `SeriesResolver` is the entry point for callers. For one contaminant it
//! makes a single live attempt under a fixed timeout, and on any failure
//! (error, timeout, no rows, or a result that does not satisfy the query)
//! serves the cache snapshot instead. Both paths run through the status
//! evaluator. Collections fan out across contaminants concurrently and
//! omit contaminants that fail entirely.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info};

use crate::alert::advisories::aggregate_advisories;
use crate::alert::status::apply_evaluation;
use crate::config::ServiceConfig;
use crate::ingest::{AdapterRegistry, SourceAdapter, contains_ignore_case};
use crate::logging::{log_collection_drop, log_collection_summary, log_source_failure};
use crate::model::{
    Advisory, AdvisoryType, Contaminant, NormalizedSeries, RegionKind, SeriesCollection,
    SeriesQuery, WaterError,
};
use crate::snapshot::SnapshotCache;
use crate::thresholds::threshold_for;

/// Whether a resolved series satisfies the query filters.
///
/// - `system_id`: compared case-insensitively when the series carries one.
/// - `site`: case-insensitive substring of the region label, for site series.
/// - `county`: compared case-insensitively when the series carries one.
///
/// `zip` and `kind` are not applied.
pub fn matches_query(series: &NormalizedSeries, query: &SeriesQuery) -> bool {
    let system_ok = match (query.system_id.as_deref(), series.system_id.as_deref()) {
        (Some(wanted), Some(actual)) => actual.eq_ignore_ascii_case(wanted.trim()),
        _ => true,
    };
    let site_ok = match query.site.as_deref() {
        Some(site) if series.region_kind == RegionKind::Site => {
            contains_ignore_case(&series.region_label, site)
        }
        _ => true,
    };
    let county_ok = match (query.county.as_deref(), series.county.as_deref()) {
        (Some(wanted), Some(actual)) => actual.eq_ignore_ascii_case(wanted.trim()),
        _ => true,
    };
    system_ok && site_ok && county_ok
}

/// Resolves normalized series for contaminants.
pub struct SeriesResolver {
    registry: AdapterRegistry,
    cache: Arc<SnapshotCache>,
    live_timeout: Duration,
}

impl SeriesResolver {
    pub fn new(registry: AdapterRegistry, cache: Arc<SnapshotCache>, live_timeout: Duration) -> Self {
        Self { registry, cache, live_timeout }
    }

    /// Production resolver: adapters and cache built from `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, WaterError> {
        let client = reqwest::Client::builder()
            .timeout(config.live_timeout())
            .user_agent(concat!("wqmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WaterError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self::new(
            AdapterRegistry::from_config(config, client),
            Arc::new(SnapshotCache::new(&config.cache_dir, config.cache_ttl())),
            config.live_timeout(),
        ))
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    // ========== Single contaminant ==========

    /// Resolves one contaminant at the current time.
    pub async fn resolve_one(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        self.resolve_one_at(contaminant, query, Utc::now()).await
    }

    /// Resolves one contaminant, evaluating status at `now`.
    ///
    /// `Ok(None)` means the cache snapshot exists but does not match the
    /// query. `Err` means neither tier could produce data.
    pub async fn resolve_one_at(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
        now: DateTime<Utc>,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        let threshold = threshold_for(contaminant)?;

        if let Some(adapter) = self.registry.get(contaminant) {
            match self.try_live(adapter.as_ref(), contaminant, query).await {
                Ok(series) => {
                    let series = apply_evaluation(series, &threshold, now);
                    if matches_query(&series, query) {
                        debug!(contaminant = %contaminant, source = adapter.name(), status = %series.status, "Resolved from live source");
                        return Ok(Some(series));
                    }
                    let err = WaterError::NotFound(format!(
                        "{} returned {} which does not match the query",
                        adapter.name(),
                        series.region_label
                    ));
                    log_source_failure(contaminant, adapter.name(), &err);
                }
                Err(err) => log_source_failure(contaminant, adapter.name(), &err),
            }
        }

        self.from_cache(contaminant, query, now).await
    }

    /// Like `resolve_one`, but absence is a `NotFound` error.
    pub async fn resolve_strict(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<NormalizedSeries, WaterError> {
        self.resolve_strict_at(contaminant, query, Utc::now()).await
    }

    pub async fn resolve_strict_at(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
        now: DateTime<Utc>,
    ) -> Result<NormalizedSeries, WaterError> {
        match self.resolve_one_at(contaminant, query, now).await {
            Ok(Some(series)) => Ok(series),
            Ok(None) => Err(WaterError::NotFound(format!(
                "no {} data matches the query",
                contaminant
            ))),
            Err(WaterError::NotFound(msg)) => Err(WaterError::NotFound(msg)),
            Err(err) => Err(WaterError::NotFound(format!("no {} data available: {}", contaminant, err))),
        }
    }

    /// Single live attempt under the fixed timeout. No retry.
    async fn try_live(
        &self,
        adapter: &dyn SourceAdapter,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<NormalizedSeries, WaterError> {
        match tokio::time::timeout(self.live_timeout, adapter.resolve(contaminant, query)).await {
            Ok(Ok(Some(series))) => Ok(series),
            Ok(Ok(None)) => Err(WaterError::NotFound(format!(
                "{} has no {} rows",
                adapter.name(),
                contaminant
            ))),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(WaterError::Timeout {
                source_name: adapter.name().to_string(),
                seconds: self.live_timeout.as_secs(),
            }),
        }
    }

    async fn from_cache(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
        now: DateTime<Utc>,
    ) -> Result<Option<NormalizedSeries>, WaterError> {
        let snapshot = self.cache.load(contaminant).await?;
        let threshold = threshold_for(contaminant)?;
        let series = apply_evaluation(NormalizedSeries::clone(&snapshot), &threshold, now);
        if matches_query(&series, query) {
            debug!(contaminant = %contaminant, status = %series.status, "Resolved from cache snapshot");
            Ok(Some(series))
        } else {
            Ok(None)
        }
    }

    // ========== Collections ==========

    /// Resolves every contaminant in `contaminants` (all seven when `None`)
    /// concurrently. Failed or unmatched contaminants are omitted.
    pub async fn resolve_collection(
        &self,
        contaminants: Option<&[Contaminant]>,
        query: &SeriesQuery,
    ) -> SeriesCollection {
        self.resolve_collection_at(contaminants, query, Utc::now()).await
    }

    pub async fn resolve_collection_at(
        &self,
        contaminants: Option<&[Contaminant]>,
        query: &SeriesQuery,
        now: DateTime<Utc>,
    ) -> SeriesCollection {
        let requested: &[Contaminant] = contaminants.unwrap_or(&Contaminant::ALL);
        let generated_at = Utc::now();

        let futures = requested.iter().map(|&contaminant| async move {
            match self.resolve_strict_at(contaminant, query, now).await {
                Ok(series) => Some(series),
                Err(err) => {
                    log_collection_drop(contaminant, &err);
                    None
                }
            }
        });

        let data: Vec<NormalizedSeries> = join_all(futures).await.into_iter().flatten().collect();
        log_collection_summary(requested.len(), data.len());

        SeriesCollection { data, generated_at }
    }

    // ========== Advisories ==========

    /// Every advisory across the full collection, de-duplicated by identity,
    /// optionally limited to one type, newest first.
    pub async fn advisories(&self, type_filter: Option<AdvisoryType>) -> Vec<Advisory> {
        self.advisories_at(type_filter, Utc::now()).await
    }

    pub async fn advisories_at(
        &self,
        type_filter: Option<AdvisoryType>,
        now: DateTime<Utc>,
    ) -> Vec<Advisory> {
        let collection = self
            .resolve_collection_at(None, &SeriesQuery::default(), now)
            .await;
        let advisories = aggregate_advisories(&collection.data, type_filter);
        info!(count = advisories.len(), series = collection.data.len(), "Aggregated advisories");
        advisories
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, ThresholdMetadata};
    use chrono::TimeZone;

    fn series(kind: RegionKind, label: &str, system: Option<&str>, county: Option<&str>) -> NormalizedSeries {
        NormalizedSeries {
            contaminant: Contaminant::Nitrate,
            metric: "m".to_string(),
            unit: "mg/L".to_string(),
            source: "test".to_string(),
            source_url: None,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            region_label: label.to_string(),
            region_kind: kind,
            system_id: system.map(String::from),
            county: county.map(String::from),
            points: Vec::new(),
            status: Status::Unknown,
            status_reason: None,
            threshold: ThresholdMetadata::default(),
            advisories: Vec::new(),
        }
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let s = series(RegionKind::System, "DMWW", Some("IA7727010"), None);
        assert!(matches_query(&s, &SeriesQuery::default()));
    }

    #[test]
    fn test_system_id_must_match_when_series_has_one() {
        let s = series(RegionKind::System, "DMWW", Some("IA7727010"), None);
        assert!(matches_query(&s, &SeriesQuery::for_system("ia7727010")));
        assert!(!matches_query(&s, &SeriesQuery::for_system("IA5276003")));
    }

    #[test]
    fn test_site_filter_applies_to_site_series_only() {
        let beach = series(RegionKind::Site, "Big Creek Beach", None, None);
        assert!(matches_query(&beach, &SeriesQuery::for_site("big creek")));
        assert!(!matches_query(&beach, &SeriesQuery::for_site("macbride")));

        let system = series(RegionKind::System, "DMWW", Some("IA7727010"), None);
        assert!(matches_query(&system, &SeriesQuery::for_site("macbride")));
    }

    #[test]
    fn test_county_filter_applies_when_series_has_county() {
        let s = series(RegionKind::System, "DMWW", Some("IA7727010"), Some("Polk"));
        let polk = SeriesQuery { county: Some("polk".to_string()), ..SeriesQuery::default() };
        let linn = SeriesQuery { county: Some("Linn".to_string()), ..SeriesQuery::default() };
        assert!(matches_query(&s, &polk));
        assert!(!matches_query(&s, &linn));
    }

    #[test]
    fn test_zip_and_kind_are_not_applied() {
        let s = series(RegionKind::System, "DMWW", Some("IA7727010"), Some("Polk"));
        let query = SeriesQuery {
            zip: Some("00000".to_string()),
            kind: Some("HAA5".to_string()),
            ..SeriesQuery::default()
        };
        assert!(matches_query(&s, &query));
    }
}
