//! Structured logging for the water-quality monitoring service.
//!
//! Installs the tracing subscriber and provides failure-classification
//! helpers so every source failure is logged with its contaminant, source
//! and classification as structured fields.
//!
//! Levels follow the fallback model: a live source failing over to the
//! cache snapshot is a WARN; a contaminant with no data at all after the
//! fallback is an ERROR.

use std::fmt;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::model::{Contaminant, WaterError};

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("logging already initialised: {}", e);
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the source simply has no rows for this query
    Expected,
    /// Unexpected failure - indicates source degradation, a payload change, or misconfiguration
    Unexpected,
    /// Unknown - cannot tell whether the source is down or just slow
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classifies a resolution failure by its error kind.
pub fn classify_failure(err: &WaterError) -> FailureType {
    match err {
        WaterError::NotFound(_) => FailureType::Expected,
        WaterError::Timeout { .. } => FailureType::Unknown,
        WaterError::Network(_) | WaterError::Validation(_) | WaterError::Configuration(_) => {
            FailureType::Unexpected
        }
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Logs a live source failure that is about to fall back to the cache.
pub fn log_source_failure(contaminant: Contaminant, source: &str, err: &WaterError) {
    warn!(
        contaminant = %contaminant,
        source,
        failure = %classify_failure(err),
        error = %err,
        "Live source failed; falling back to cache snapshot"
    );
}

/// Logs a contaminant dropped from a collection because neither the live
/// source nor the cache produced data.
pub fn log_collection_drop(contaminant: Contaminant, err: &WaterError) {
    error!(
        contaminant = %contaminant,
        failure = %classify_failure(err),
        error = %err,
        "No data available; contaminant omitted from collection"
    );
}

// ---------------------------------------------------------------------------
// Collection Summary Logging
// ---------------------------------------------------------------------------

/// Logs a summary of a collection resolution.
pub fn log_collection_summary(requested: usize, resolved: usize) {
    let dropped = requested.saturating_sub(resolved);
    if dropped == 0 {
        info!(requested, resolved, "Collection resolved");
    } else if resolved == 0 {
        error!(requested, resolved, dropped, "Collection resolved with no data");
    } else {
        warn!(requested, resolved, dropped, "Collection resolved partially");
    }
}
