//! Water-quality monitoring service.
//!
//! Ingests regulated-contaminant measurements (nitrate, nitrite, E. coli,
//! PFAS, arsenic, disinfection byproducts, fluoride) from several upstream
//! sources, normalizes them into one time-series shape, and classifies
//! each series as safe / warn / alert / unknown.
//!
//! Modules, leaf first:
//! - `model`: shared types and the error enum.
//! - `thresholds`: the static threshold registry.
//! - `alert`: status evaluation, staleness, advisory aggregation.
//! - `ingest`: source adapters and the adapter registry.
//! - `snapshot`: read-through cache over on-disk snapshot files.
//! - `resolve`: live → cache fallback, collections, advisories.
//! - `config`, `logging`: service plumbing.

pub mod alert;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod resolve;
pub mod snapshot;
pub mod thresholds;

pub use model::{
    Advisory, AdvisoryType, Contaminant, NormalizedSeries, SeriesCollection, SeriesQuery, Status,
    WaterError,
};
pub use resolve::SeriesResolver;
