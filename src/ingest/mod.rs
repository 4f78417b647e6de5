//! Upstream source adapters.
//!
//! Every adapter turns one family of upstream payloads into a
//! `NormalizedSeries`. Adapters share one capability (`SourceAdapter`) and
//! are selected per contaminant through `AdapterRegistry`.
//!
//! Submodules:
//! - `beach`: beach-monitoring E. coli feed with swim advisories.
//! - `pfas`: PFAS survey feed keyed by water system.
//! - `compliance`: in-memory regulatory compliance dataset.

pub mod beach;
pub mod compliance;
pub mod pfas;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::model::{Contaminant, NormalizedSeries, SeriesQuery, WaterError};

// ---------------------------------------------------------------------------
// Adapter capability
// ---------------------------------------------------------------------------

/// A live source for one or more contaminants.
///
/// `Ok(None)` means the adapter ran but had no records left after
/// filtering; the resolver treats that the same as a failure.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable source name, used in logs and on the series.
    fn name(&self) -> &str;

    async fn resolve(
        &self,
        contaminant: Contaminant,
        query: &SeriesQuery,
    ) -> Result<Option<NormalizedSeries>, WaterError>;
}

/// Static mapping from contaminant to its live adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Contaminant, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for `contaminant`, replacing any earlier entry.
    pub fn with(mut self, contaminant: Contaminant, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(contaminant, adapter);
        self
    }

    pub fn get(&self, contaminant: Contaminant) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&contaminant).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Builds the production registry.
    ///
    /// The compliance dataset serves every contaminant; the beach and PFAS
    /// feeds replace it for E. coli and PFAS when live feeds are enabled and
    /// their URLs are configured.
    pub fn from_config(config: &ServiceConfig, client: reqwest::Client) -> Self {
        let compliance: Arc<dyn SourceAdapter> = Arc::new(compliance::ComplianceAdapter::new());
        let mut registry = Contaminant::ALL
            .into_iter()
            .fold(Self::new(), |r, c| r.with(c, Arc::clone(&compliance)));

        if config.use_live_feeds {
            if let Some(url) = &config.beach_feed_url {
                registry = registry.with(
                    Contaminant::Ecoli,
                    Arc::new(beach::BeachAdapter::new(client.clone(), url)),
                );
            }
            if let Some(url) = &config.pfas_feed_url {
                registry = registry.with(
                    Contaminant::Pfas,
                    Arc::new(pfas::PfasSurveyAdapter::new(client, url)),
                );
            }
        }
        registry
    }
}

// ---------------------------------------------------------------------------
// Feed fetch
// ---------------------------------------------------------------------------

/// Fetches a remote JSON array of loosely-typed records.
///
/// The feeds take no parameters; filtering happens client side. Records are
/// returned as raw JSON so each adapter can decode them one at a time and
/// drop the ones it cannot coerce.
pub async fn fetch_records(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<serde_json::Value>, WaterError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(WaterError::Network(format!("HTTP {} from {}", response.status(), url)));
    }

    let body: serde_json::Value = response.json().await?;
    match body {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(records)) => Ok(records),
            _ => Err(WaterError::Validation(format!("{} did not return a record array", url))),
        },
        _ => Err(WaterError::Validation(format!("{} did not return a record array", url))),
    }
}

// ---------------------------------------------------------------------------
// Tolerant decoding helpers
// ---------------------------------------------------------------------------

/// A field that upstream sends as either a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl LooseValue {
    /// Numeric reading, accepting `"<10"`, `"1,234"` and similar strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LooseValue::Number(n) if n.is_finite() => Some(*n),
            LooseValue::Number(_) | LooseValue::Bool(_) => None,
            LooseValue::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_start_matches(['<', '>', '='])
                    .chars()
                    .filter(|c| *c != ',')
                    .collect();
                cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    /// Truthy advisory flags: `true`, non-zero numbers, and the usual
    /// yes-like strings.
    pub fn as_flag(&self) -> bool {
        match self {
            LooseValue::Bool(b) => *b,
            LooseValue::Number(n) => *n != 0.0,
            LooseValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "y" | "yes" | "true" | "1" | "advisory" | "posted"
            ),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            LooseValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            LooseValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Text of the first spelling that is present and non-blank.
pub fn first_text<'a>(candidates: impl IntoIterator<Item = &'a Option<LooseValue>>) -> Option<String> {
    candidates.into_iter().flatten().find_map(LooseValue::as_text)
}

/// Reading of the first spelling that coerces to a number.
pub fn first_number<'a>(candidates: impl IntoIterator<Item = &'a Option<LooseValue>>) -> Option<f64> {
    candidates.into_iter().flatten().find_map(LooseValue::as_number)
}

/// Date of the first spelling that parses as one.
pub fn first_date<'a>(candidates: impl IntoIterator<Item = &'a Option<LooseValue>>) -> Option<NaiveDate> {
    candidates
        .into_iter()
        .flatten()
        .filter_map(LooseValue::as_text)
        .find_map(|raw| parse_loose_date(&raw))
}

/// Parses the date formats seen across upstream feeds.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok()
}

/// Case-insensitive substring match used for site filtering.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
