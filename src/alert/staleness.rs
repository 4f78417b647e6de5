//! Sample staleness detection.
//!
//! Regulatory samples are taken on schedules ranging from weekly (beaches)
//! to annually (arsenic, PFAS). A reading older than its contaminant's
//! freshness window no longer describes the water coming out of the tap,
//! so the evaluator treats it as at least a warning.
//!
//! # Clock injection
//! All functions accept a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally. This keeps staleness deterministic in tests.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::ThresholdMetadata;
use crate::thresholds::DEFAULT_FRESHNESS_DAYS;

/// Whole calendar days between the sample date and `now`'s UTC date.
/// Negative when the sample is dated in the future.
pub fn age_in_days(sample_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - sample_date).num_days()
}

/// Freshness window for a threshold record, falling back to the default.
pub fn freshness_window(threshold: &ThresholdMetadata) -> u32 {
    threshold.freshness_days.unwrap_or(DEFAULT_FRESHNESS_DAYS)
}

/// Returns `true` if the sample is older than `freshness_days` relative to `now`.
///
/// Staleness is strictly greater than the window:
///   age > freshness_days  →  stale
///   age == freshness_days →  not stale
pub fn is_stale_at(sample_date: NaiveDate, freshness_days: u32, now: DateTime<Utc>) -> bool {
    age_in_days(sample_date, now) > i64::from(freshness_days)
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(sample_date: NaiveDate, freshness_days: u32) -> bool {
    is_stale_at(sample_date, freshness_days, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
