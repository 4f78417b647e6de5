//! Advisory identity and aggregation.
//!
//! Adapters emit advisories as a side effect of normalization. This module
//! builds their identity slug and reduces the advisories of a whole
//! collection into one de-duplicated, newest-first list.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{Advisory, AdvisoryType, Contaminant, NormalizedSeries};

/// Identity slug for an advisory: `contaminant-region-date`, lowercased,
/// with every run of non-alphanumeric characters collapsed to one `-`.
pub fn advisory_id(contaminant: Contaminant, region: &str, date: NaiveDate) -> String {
    let raw = format!("{}-{}-{}", contaminant.slug(), region, date.format("%Y-%m-%d"));
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Flattens every series' advisories, keeps the last one seen per identity,
/// optionally keeps only `type_filter`, and sorts by issue time descending.
///
/// Ties on issue time are ordered by identity so output is stable.
pub fn aggregate_advisories(
    series: &[NormalizedSeries],
    type_filter: Option<AdvisoryType>,
) -> Vec<Advisory> {
    let mut by_id: HashMap<&str, &Advisory> = HashMap::new();
    for advisory in series.iter().flat_map(|s| s.advisories.iter()) {
        by_id.insert(advisory.id.as_str(), advisory);
    }

    let mut advisories: Vec<Advisory> = by_id
        .into_values()
        .filter(|a| type_filter.is_none_or(|t| a.advisory_type == t))
        .cloned()
        .collect();

    advisories.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| a.id.cmp(&b.id)));
    advisories
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
