//! Threshold registry for the water-quality monitoring service.
//!
//! Defines the canonical regulatory and advisory thresholds for every
//! tracked contaminant, along with the display copy shown next to each
//! status. This is the single source of truth for threshold values; all
//! other modules should look thresholds up here rather than hardcoding them.
//!
//! Sources:
//!   - MCLs: EPA National Primary Drinking Water Regulations
//!   - PFAS: EPA 2024 PFOA/PFOS MCL (4.0 ppt)
//!   - E. coli: state beach-monitoring single-sample advisory level (235 CFU/100 mL)

use crate::model::{Contaminant, ThresholdMetadata, WaterError};

/// Freshness window applied when a contaminant does not define its own.
pub const DEFAULT_FRESHNESS_DAYS: u32 = 30;

// ---------------------------------------------------------------------------
// Contaminant profiles
// ---------------------------------------------------------------------------

/// Static threshold and display metadata for one contaminant.
pub struct ContaminantProfile {
    pub contaminant: Contaminant,
    /// Metric name shown next to the series.
    pub metric: &'static str,
    pub unit: &'static str,
    /// Legal Maximum Contaminant Level, where one exists.
    pub mcl: Option<f64>,
    /// Secondary trigger that raises a reading to warn on its own.
    pub health_advisory: Option<f64>,
    pub warn_level: Option<f64>,
    pub alert_level: Option<f64>,
    /// Maximum sample age in days before the reading counts as stale.
    pub freshness_days: Option<u32>,
    pub safe_copy: &'static str,
    pub warn_copy: &'static str,
    pub alert_copy: &'static str,
}

impl ContaminantProfile {
    /// Owned threshold record, as denormalized onto each series.
    pub fn metadata(&self) -> ThresholdMetadata {
        ThresholdMetadata {
            unit: self.unit.to_string(),
            mcl: self.mcl,
            health_advisory: self.health_advisory,
            warn_level: self.warn_level,
            alert_level: self.alert_level,
            freshness_days: self.freshness_days,
            safe_copy: self.safe_copy.to_string(),
            warn_copy: self.warn_copy.to_string(),
            alert_copy: self.alert_copy.to_string(),
        }
    }
}

/// One profile per contaminant, in `Contaminant::ALL` order.
pub static THRESHOLD_REGISTRY: &[ContaminantProfile] = &[
    ContaminantProfile {
        contaminant: Contaminant::Nitrate,
        metric: "Nitrate (as N)",
        unit: "mg/L",
        mcl: Some(10.0),
        health_advisory: None,
        warn_level: Some(5.0),
        alert_level: Some(10.0),
        freshness_days: Some(90),
        safe_copy: "Nitrate is well below the federal limit.",
        warn_copy: "Nitrate is above half the federal limit. Infants under six months \
                    are the most sensitive; watch for further increases.",
        alert_copy: "Nitrate meets or exceeds the 10 mg/L federal limit. Do not use tap \
                     water to prepare infant formula.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Nitrite,
        metric: "Nitrite (as N)",
        unit: "mg/L",
        mcl: Some(1.0),
        health_advisory: None,
        warn_level: Some(0.5),
        alert_level: Some(1.0),
        freshness_days: Some(90),
        safe_copy: "Nitrite is well below the federal limit.",
        warn_copy: "Nitrite is above half the federal limit.",
        alert_copy: "Nitrite meets or exceeds the 1 mg/L federal limit.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Ecoli,
        metric: "E. coli",
        unit: "CFU/100 mL",
        mcl: None,
        health_advisory: None,
        warn_level: Some(126.0),
        alert_level: Some(235.0),
        freshness_days: Some(7),
        safe_copy: "Bacteria levels are within the recreational standard.",
        warn_copy: "Bacteria levels are elevated. Avoid swallowing water.",
        alert_copy: "Bacteria levels exceed the single-sample swim advisory level. \
                     Swimming is not recommended.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Pfas,
        metric: "PFOA + PFOS",
        unit: "ppt",
        mcl: Some(4.0),
        health_advisory: Some(2.0),
        warn_level: Some(2.0),
        alert_level: Some(4.0),
        freshness_days: Some(365),
        safe_copy: "PFAS were not detected above reporting levels.",
        warn_copy: "PFAS were detected below the federal limit.",
        alert_copy: "PFAS meet or exceed the 4 ppt federal limit.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Arsenic,
        metric: "Arsenic",
        unit: "µg/L",
        mcl: Some(10.0),
        health_advisory: None,
        warn_level: Some(5.0),
        alert_level: Some(10.0),
        freshness_days: Some(365),
        safe_copy: "Arsenic is well below the federal limit.",
        warn_copy: "Arsenic is above half the federal limit.",
        alert_copy: "Arsenic meets or exceeds the 10 µg/L federal limit.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Dbp,
        metric: "Total trihalomethanes (TTHM)",
        unit: "µg/L",
        mcl: Some(80.0),
        health_advisory: None,
        warn_level: Some(60.0),
        alert_level: Some(80.0),
        freshness_days: Some(120),
        safe_copy: "Disinfection byproducts are within the federal limit.",
        warn_copy: "Disinfection byproducts are approaching the federal limit.",
        alert_copy: "Disinfection byproducts meet or exceed the 80 µg/L running average limit.",
    },
    ContaminantProfile {
        contaminant: Contaminant::Fluoride,
        metric: "Fluoride",
        unit: "mg/L",
        mcl: Some(4.0),
        health_advisory: Some(2.0),
        warn_level: None,
        alert_level: Some(4.0),
        freshness_days: Some(365),
        safe_copy: "Fluoride is within the recommended range.",
        warn_copy: "Fluoride is above the 2 mg/L secondary standard; children may \
                    develop dental fluorosis.",
        alert_copy: "Fluoride meets or exceeds the 4 mg/L federal limit.",
    },
];

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Looks up the static profile for a contaminant.
pub fn profile_for(contaminant: Contaminant) -> Result<&'static ContaminantProfile, WaterError> {
    THRESHOLD_REGISTRY
        .iter()
        .find(|p| p.contaminant == contaminant)
        .ok_or_else(|| {
            WaterError::Configuration(format!("no threshold profile for {}", contaminant))
        })
}

/// Threshold metadata for a contaminant.
///
/// Total over `Contaminant::ALL`; the error arm is only reachable if the
/// registry falls out of step with the enum.
pub fn threshold_for(contaminant: Contaminant) -> Result<ThresholdMetadata, WaterError> {
    profile_for(contaminant).map(ContaminantProfile::metadata)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_contaminant_has_exactly_one_profile() {
        for contaminant in Contaminant::ALL {
            let count = THRESHOLD_REGISTRY
                .iter()
                .filter(|p| p.contaminant == contaminant)
                .count();
            assert_eq!(count, 1, "expected one profile for {}, found {}", contaminant, count);
        }
        assert_eq!(THRESHOLD_REGISTRY.len(), Contaminant::ALL.len());
    }

    #[test]
    fn test_warn_level_never_exceeds_alert_level() {
        // A warn level above the alert level would make warn unreachable.
        for profile in THRESHOLD_REGISTRY {
            if let (Some(warn), Some(alert)) = (profile.warn_level, profile.alert_level) {
                assert!(
                    warn <= alert,
                    "warn must not exceed alert for '{}'",
                    profile.contaminant
                );
            }
        }
    }

    #[test]
    fn test_every_profile_defines_an_alert_trigger() {
        for profile in THRESHOLD_REGISTRY {
            assert!(
                profile.alert_level.is_some(),
                "'{}' has no alert level; it could never reach alert",
                profile.contaminant
            );
        }
    }

    #[test]
    fn test_threshold_for_copies_profile_values() {
        let nitrate = threshold_for(Contaminant::Nitrate).expect("nitrate is registered");
        assert_eq!(nitrate.unit, "mg/L");
        assert_eq!(nitrate.warn_level, Some(5.0));
        assert_eq!(nitrate.alert_level, Some(10.0));
        assert!(!nitrate.alert_copy.is_empty());
    }

    #[test]
    fn test_pfas_alert_level_matches_federal_limit() {
        let pfas = threshold_for(Contaminant::Pfas).unwrap();
        assert_eq!(pfas.alert_level, Some(4.0));
        assert_eq!(pfas.mcl, Some(4.0));
    }
}
