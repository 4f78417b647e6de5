//! Status evaluation.
//!
//! Turns a normalized series plus its threshold metadata into a single
//! safety classification. The series-level rules run in a fixed order and
//! stop at the first match:
//!
//! 1. an active-alert or boil advisory wins outright
//! 2. no present value anywhere → unknown
//! 3. an alert-level latest value is always alert
//! 4. a stale sample is raised to warn, never lowered
//! 5. a warn-level latest value is warn
//! 6. otherwise safe

use chrono::{DateTime, Utc};

use crate::alert::staleness::{freshness_window, is_stale_at};
use crate::model::{AdvisoryType, NormalizedSeries, Status, StatusReason, ThresholdMetadata};

/// Series-level classification and the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvaluation {
    pub status: Status,
    pub reason: StatusReason,
}

impl StatusEvaluation {
    fn new(status: Status, reason: StatusReason) -> Self {
        Self { status, reason }
    }
}

/// Classifies a single reading against a threshold.
///
/// Alert is checked first, so a value that also clears the warn or health
/// advisory level still reports alert.
pub fn point_status(value: Option<f64>, threshold: &ThresholdMetadata) -> Status {
    let Some(value) = value else {
        return Status::Unknown;
    };

    if threshold.alert_level.is_some_and(|alert| value >= alert) {
        return Status::Alert;
    }

    let meets_warn = threshold.warn_level.is_some_and(|warn| value >= warn);
    let meets_advisory = threshold.health_advisory.is_some_and(|ha| value >= ha);
    if meets_warn || meets_advisory {
        Status::Warn
    } else {
        Status::Safe
    }
}

/// Evaluates the series-level status at `now`.
///
/// Assumes `series.points` is sorted by ascending date. Pure: the same
/// series and `now` always give the same result.
pub fn evaluate_status(
    series: &NormalizedSeries,
    threshold: &ThresholdMetadata,
    now: DateTime<Utc>,
) -> StatusEvaluation {
    let advisory_override = series
        .advisories
        .iter()
        .any(|a| a.status == Status::Alert || a.advisory_type == AdvisoryType::Boil);
    if advisory_override {
        return StatusEvaluation::new(Status::Alert, StatusReason::Advisory);
    }

    let Some((latest_date, latest_value)) = series
        .points
        .iter()
        .rev()
        .find_map(|p| p.value.map(|v| (p.date, v)))
    else {
        return StatusEvaluation::new(Status::Unknown, StatusReason::NoData);
    };

    let value_status = point_status(Some(latest_value), threshold);
    if value_status == Status::Alert {
        return StatusEvaluation::new(Status::Alert, StatusReason::Value);
    }

    let stale = is_stale_at(latest_date, freshness_window(threshold), now);
    if stale && value_status < Status::Warn {
        return StatusEvaluation::new(Status::Warn, StatusReason::Stale);
    }

    if value_status == Status::Warn {
        return StatusEvaluation::new(Status::Warn, StatusReason::Value);
    }

    StatusEvaluation::new(Status::Safe, StatusReason::Value)
}

/// Writes the evaluation into the series: per-point status for display,
/// the series status, and its reason. The series' denormalized threshold
/// is replaced with `threshold`.
pub fn apply_evaluation(
    mut series: NormalizedSeries,
    threshold: &ThresholdMetadata,
    now: DateTime<Utc>,
) -> NormalizedSeries {
    for point in &mut series.points {
        point.status = Some(point_status(point.value, threshold));
    }
    let evaluation = evaluate_status(&series, threshold, now);
    series.status = evaluation.status;
    series.status_reason = Some(evaluation.reason);
    series.threshold = threshold.clone();
    series
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
