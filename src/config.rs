//! Service configuration.
//!
//! Settings come from an optional TOML file, then `WQMON_*` environment
//! variables (a `.env` file in the working directory is loaded first).
//! Environment values win over the file.
//!
//! ```toml
//! cache_dir = "data/cache"
//! live_timeout_secs = 20
//! cache_ttl_secs = 3600
//! beach_feed_url = "https://example.org/beach-monitoring.json"
//! pfas_feed_url = "https://example.org/pfas-survey.json"
//! use_live_feeds = true
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::model::WaterError;

pub const DEFAULT_CACHE_DIR: &str = "data/cache";
pub const DEFAULT_LIVE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding one `<contaminant>.json` snapshot per contaminant.
    pub cache_dir: PathBuf,
    /// Wall-clock limit for a single live adapter call.
    pub live_timeout_secs: u64,
    /// How long a loaded snapshot is reused; unset means until restart.
    pub cache_ttl_secs: Option<u64>,
    pub beach_feed_url: Option<String>,
    pub pfas_feed_url: Option<String>,
    /// When false, E. coli and PFAS are served by the compliance dataset.
    pub use_live_feeds: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            live_timeout_secs: DEFAULT_LIVE_TIMEOUT_SECS,
            cache_ttl_secs: None,
            beach_feed_url: None,
            pfas_feed_url: None,
            use_live_feeds: true,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from `path` (if given and present) plus the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, WaterError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    WaterError::Configuration(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&text)?
            }
            Some(path) => {
                return Err(WaterError::Configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, WaterError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `WQMON_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), WaterError> {
        if let Some(dir) = lookup("WQMON_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("WQMON_LIVE_TIMEOUT_SECS") {
            self.live_timeout_secs = parse_env("WQMON_LIVE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("WQMON_CACHE_TTL_SECS") {
            self.cache_ttl_secs = Some(parse_env("WQMON_CACHE_TTL_SECS", &secs)?);
        }
        if let Some(url) = lookup("WQMON_BEACH_FEED_URL") {
            self.beach_feed_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(url) = lookup("WQMON_PFAS_FEED_URL") {
            self.pfas_feed_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(flag) = lookup("WQMON_USE_LIVE_FEEDS") {
            self.use_live_feeds = parse_env("WQMON_USE_LIVE_FEEDS", &flag)?;
        }
        if let Some(level) = lookup("WQMON_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), WaterError> {
        if self.live_timeout_secs == 0 {
            return Err(WaterError::Configuration(
                "live_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn live_timeout(&self) -> Duration {
        Duration::from_secs(self.live_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, WaterError> {
    raw.trim()
        .parse()
        .map_err(|_| WaterError::Configuration(format!("{} has invalid value '{}'", key, raw)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.live_timeout(), Duration::from_secs(DEFAULT_LIVE_TIMEOUT_SECS));
        assert_eq!(config.cache_ttl(), None);
    }

    #[test]
    fn test_toml_values_are_read() {
        let config = ServiceConfig::from_toml(
            r#"
            cache_dir = "/var/lib/wqmon"
            live_timeout_secs = 5
            cache_ttl_secs = 600
            beach_feed_url = "https://example.org/beaches.json"
            use_live_feeds = false
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/lib/wqmon"));
        assert_eq!(config.live_timeout_secs, 5);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.beach_feed_url.as_deref(), Some("https://example.org/beaches.json"));
        assert!(!config.use_live_feeds);
    }

    #[test]
    fn test_bad_toml_is_configuration_error() {
        let err = ServiceConfig::from_toml("live_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, WaterError::Configuration(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WQMON_CACHE_DIR", "/tmp/snapshots"),
            ("WQMON_LIVE_TIMEOUT_SECS", "3"),
            ("WQMON_PFAS_FEED_URL", "https://example.org/pfas.json"),
            ("WQMON_BEACH_FEED_URL", ""),
            ("WQMON_USE_LIVE_FEEDS", "false"),
        ]);
        let mut config = ServiceConfig {
            beach_feed_url: Some("https://example.org/old.json".to_string()),
            ..ServiceConfig::default()
        };
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/snapshots"));
        assert_eq!(config.live_timeout_secs, 3);
        assert_eq!(config.pfas_feed_url.as_deref(), Some("https://example.org/pfas.json"));
        assert_eq!(config.beach_feed_url, None, "empty override clears the feed");
        assert!(!config.use_live_feeds);
    }

    #[test]
    fn test_invalid_env_number_is_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(|key| (key == "WQMON_CACHE_TTL_SECS").then(|| "forever".to_string()))
            .unwrap_err();
        assert!(matches!(err, WaterError::Configuration(_)));
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let config = ServiceConfig { live_timeout_secs: 0, ..ServiceConfig::default() };
        assert!(config.validate().is_err());
    }
}
