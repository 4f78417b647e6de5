//! Cache snapshot reader.
//!
//! The fixture generator writes one JSON file per contaminant
//! (`<cache_dir>/<slug>.json`), each holding a single normalized series.
//! `SnapshotCache` is a read-through cache over those files keyed by
//! contaminant: each file is read at most once per TTL window (or once per
//! cache lifetime when no TTL is set), even when several callers ask for
//! the same contaminant concurrently.
//!
//! The persisted `status` is not trusted; callers re-run the evaluator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{Contaminant, NormalizedSeries, WaterError};

struct CachedSnapshot {
    loaded_at: Instant,
    series: Arc<NormalizedSeries>,
}

/// Read-through cache over the per-contaminant snapshot files.
pub struct SnapshotCache {
    dir: PathBuf,
    ttl: Option<Duration>,
    slots: HashMap<Contaminant, Mutex<Option<CachedSnapshot>>>,
}

impl SnapshotCache {
    /// `ttl = None` keeps a loaded snapshot for the life of the cache.
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        let slots = Contaminant::ALL
            .into_iter()
            .map(|c| (c, Mutex::new(None)))
            .collect();
        Self { dir: dir.into(), ttl, slots }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `contaminant`.
    pub fn path_for(&self, contaminant: Contaminant) -> PathBuf {
        self.dir.join(format!("{}.json", contaminant.slug()))
    }

    /// Returns the snapshot for `contaminant`, reading the file only when
    /// nothing fresh is cached. Failed reads are not cached.
    pub async fn load(&self, contaminant: Contaminant) -> Result<Arc<NormalizedSeries>, WaterError> {
        let slot = self.slots.get(&contaminant).ok_or_else(|| {
            WaterError::Configuration(format!("no snapshot slot for {}", contaminant))
        })?;

        let mut guard = slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            let fresh = self.ttl.is_none_or(|ttl| cached.loaded_at.elapsed() < ttl);
            if fresh {
                return Ok(Arc::clone(&cached.series));
            }
        }

        let series = Arc::new(read_snapshot(&self.path_for(contaminant), contaminant).await?);
        *guard = Some(CachedSnapshot { loaded_at: Instant::now(), series: Arc::clone(&series) });
        Ok(series)
    }

    /// Drops every cached snapshot so the next load re-reads from disk.
    pub async fn invalidate(&self) {
        for slot in self.slots.values() {
            *slot.lock().await = None;
        }
    }
}

/// Reads and decodes one snapshot file.
///
/// A missing file is `NotFound`; an unreadable or malformed one, or one
/// holding a different contaminant, is `Validation`.
pub async fn read_snapshot(path: &Path, contaminant: Contaminant) -> Result<NormalizedSeries, WaterError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WaterError::NotFound(format!("no cache snapshot at {}", path.display())));
        }
        Err(e) => {
            return Err(WaterError::Validation(format!("cannot read {}: {}", path.display(), e)));
        }
    };

    let series: NormalizedSeries = serde_json::from_str(&text)
        .map_err(|e| WaterError::Validation(format!("{}: {}", path.display(), e)))?;
    if series.contaminant != contaminant {
        return Err(WaterError::Validation(format!(
            "{} holds {} data, expected {}",
            path.display(),
            series.contaminant,
            contaminant
        )));
    }

    debug!(contaminant = %contaminant, path = %path.display(), points = series.points.len(), "Loaded cache snapshot");
    Ok(series)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json(contaminant: &str, value: f64) -> String {
        format!(
            r#"{{
                "contaminant": "{contaminant}",
                "metric": "m",
                "unit": "mg/L",
                "source": "fixture",
                "updatedAt": "2024-05-01T00:00:00Z",
                "regionLabel": "Des Moines Water Works",
                "regionKind": "system",
                "systemId": "IA7727010",
                "points": [{{ "date": "2024-05-01", "value": {value} }}],
                "status": "alert"
            }}"#
        )
    }

    #[test]
    fn test_snapshot_path_is_slug_under_cache_dir() {
        let cache = SnapshotCache::new("data/cache", None);
        assert_eq!(cache.dir(), Path::new("data/cache"));
        assert_eq!(cache.path_for(Contaminant::Ecoli), cache.dir().join("ecoli.json"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path(), None);
        let err = cache.load(Contaminant::Arsenic).await.unwrap_err();
        assert!(matches!(err, WaterError::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_malformed_file_is_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nitrate.json"), "{ not json").unwrap();
        let cache = SnapshotCache::new(dir.path(), None);
        let err = cache.load(Contaminant::Nitrate).await.unwrap_err();
        assert!(matches!(err, WaterError::Validation(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_wrong_contaminant_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nitrate.json"), snapshot_json("arsenic", 1.0)).unwrap();
        let cache = SnapshotCache::new(dir.path(), None);
        assert!(matches!(
            cache.load(Contaminant::Nitrate).await,
            Err(WaterError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_read_once_without_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nitrate.json");
        std::fs::write(&path, snapshot_json("nitrate", 7.1)).unwrap();
        let cache = SnapshotCache::new(dir.path(), None);

        let first = cache.load(Contaminant::Nitrate).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = cache.load(Contaminant::Nitrate).await.expect("served from memory");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_expired_ttl_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nitrate.json");
        std::fs::write(&path, snapshot_json("nitrate", 7.1)).unwrap();
        let cache = SnapshotCache::new(dir.path(), Some(Duration::ZERO));

        cache.load(Contaminant::Nitrate).await.unwrap();
        std::fs::write(&path, snapshot_json("nitrate", 9.4)).unwrap();
        let reloaded = cache.load(Contaminant::Nitrate).await.unwrap();
        assert_eq!(reloaded.points[0].value, Some(9.4));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nitrate.json");
        std::fs::write(&path, snapshot_json("nitrate", 7.1)).unwrap();
        let cache = SnapshotCache::new(dir.path(), None);

        cache.load(Contaminant::Nitrate).await.unwrap();
        std::fs::write(&path, snapshot_json("nitrate", 2.5)).unwrap();
        cache.invalidate().await;
        assert_eq!(cache.load(Contaminant::Nitrate).await.unwrap().points[0].value, Some(2.5));
    }
}
