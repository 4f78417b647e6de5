//! Threshold evaluation, staleness, and advisory handling.
//!
//! Submodules:
//! - `status`: point and series status classification.
//! - `staleness`: sample age against each contaminant's freshness window.
//! - `advisories`: advisory identity and cross-contaminant aggregation.

pub mod advisories;
pub mod staleness;
pub mod status;
