//! Snapshot persistence: mirror the store into a flat JSON file.
//!
//! File format: a JSON array of `{id, type, value|delta}` records, gauges first
//! then counters, each sorted by name. Counters hold their accumulated total
//! and are restored with `set_counter`, so loading twice does not double them.
//!
//! Saves go to `<path>.tmp` and are renamed over `path`; a crash mid-save
//! leaves the previous snapshot intact.

pub mod schedule;

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use metricsd_core::{Metric, MetricValue, MetricsError, Result};

use crate::config::ServerConfig;
use crate::store::MetricStore;

pub use schedule::SaveMode;

pub struct Snapshotter {
    path: PathBuf,
    restore: bool,
    store: Arc<dyn MetricStore>,
    // Serializes writers of the shared tmp file.
    save_lock: Mutex<()>,
}

impl Snapshotter {
    pub fn new(path: impl Into<PathBuf>, restore: bool, store: Arc<dyn MetricStore>) -> Self {
        Self { path: path.into(), restore, store, save_lock: Mutex::new(()) }
    }

    /// `None` when snapshots are disabled (empty path).
    pub fn from_config(cfg: &ServerConfig, store: Arc<dyn MetricStore>) -> Option<Self> {
        cfg.snapshots_enabled()
            .then(|| Self::new(cfg.file_storage_path.trim(), cfg.restore, store))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the store from the snapshot file. Returns the number of
    /// metrics applied.
    ///
    /// Restore disabled or a missing file is an empty start, not an error. A
    /// file that exists but cannot be read or parsed is a `Persistence` error.
    pub async fn load(&self) -> Result<usize> {
        if !self.restore {
            tracing::info!(path = %self.path.display(), "restore disabled, starting empty");
            return Ok(0);
        }

        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no snapshot yet, starting empty");
                return Ok(0);
            }
            Err(e) => {
                return Err(MetricsError::Persistence(format!(
                    "read {} failed: {e}",
                    self.path.display()
                )))
            }
        };

        // A zero-length file is what a crash between create and first write leaves.
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }

        let metrics: Vec<Metric> = serde_json::from_slice(&raw).map_err(|e| {
            MetricsError::Persistence(format!("malformed snapshot {}: {e}", self.path.display()))
        })?;

        for m in &metrics {
            match m.value {
                MetricValue::Gauge(v) => self.store.upsert_gauge(&m.name, v).await?,
                MetricValue::Counter(total) => self.store.set_counter(&m.name, total).await?,
            }
        }

        tracing::info!(path = %self.path.display(), restored = metrics.len(), "snapshot loaded");
        Ok(metrics.len())
    }

    /// Write the full store state to the snapshot file. Returns the number of
    /// metrics written.
    pub async fn save(&self) -> Result<usize> {
        let _guard = self.save_lock.lock().await;

        let metrics = self.store.read_all().await?.into_metrics();
        let body = serde_json::to_vec_pretty(&metrics)
            .map_err(|e| MetricsError::Persistence(format!("encode snapshot failed: {e}")))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                MetricsError::Persistence(format!("create {} failed: {e}", dir.display()))
            })?;
        }

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, &body).await.map_err(|e| {
            MetricsError::Persistence(format!("write {} failed: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            MetricsError::Persistence(format!("rename to {} failed: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), metrics = metrics.len(), "snapshot saved");
        Ok(metrics.len())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::MemoryStore;

    fn memory() -> Arc<dyn MetricStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn save_then_load_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/metrics.json");

        let src = memory();
        src.upsert_gauge("Alloc", 1024.0).await.unwrap();
        src.upsert_gauge("RandomValue", 0.125).await.unwrap();
        src.increment_counter("PollCount", 41).await.unwrap();
        src.increment_counter("PollCount", 1).await.unwrap();

        let written = Snapshotter::new(&path, true, Arc::clone(&src)).save().await.unwrap();
        assert_eq!(written, 3);
        assert!(!tmp_path(&path).exists());

        let dst = memory();
        let loaded = Snapshotter::new(&path, true, Arc::clone(&dst)).load().await.unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(dst.read_all().await.unwrap(), src.read_all().await.unwrap());
    }

    #[tokio::test]
    async fn loading_twice_sets_counters_instead_of_adding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"[{"id":"PollCount","type":"counter","delta":5}]"#).unwrap();

        let store = memory();
        let snap = Snapshotter::new(&path, true, Arc::clone(&store));
        snap.load().await.unwrap();
        snap.load().await.unwrap();
        assert_eq!(store.read_counter("PollCount").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn file_is_a_sorted_record_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let store = memory();
        store.increment_counter("b", 2).await.unwrap();
        store.upsert_gauge("z", 1.5).await.unwrap();
        store.upsert_gauge("a", -3.0).await.unwrap();
        Snapshotter::new(&path, true, store).save().await.unwrap();

        let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!([
                {"id": "a", "type": "gauge", "value": -3.0},
                {"id": "z", "type": "gauge", "value": 1.5},
                {"id": "b", "type": "counter", "delta": 2}
            ])
        );
    }

    #[tokio::test]
    async fn missing_file_or_restore_off_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let store = memory();
        assert_eq!(Snapshotter::new(&path, true, Arc::clone(&store)).load().await.unwrap(), 0);

        std::fs::write(&path, r#"[{"id":"g","type":"gauge","value":1.0}]"#).unwrap();
        assert_eq!(Snapshotter::new(&path, false, Arc::clone(&store)).load().await.unwrap(), 0);
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let store = memory();

        std::fs::write(&path, "{not json").unwrap();
        let err = Snapshotter::new(&path, true, Arc::clone(&store)).load().await.unwrap_err();
        assert!(matches!(err, MetricsError::Persistence(_)));

        // both payloads on one record is rejected too
        std::fs::write(&path, r#"[{"id":"x","type":"gauge","value":1.0,"delta":1}]"#).unwrap();
        let err = Snapshotter::new(&path, true, Arc::clone(&store)).load().await.unwrap_err();
        assert!(matches!(err, MetricsError::Persistence(_)));
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "").unwrap();
        assert_eq!(Snapshotter::new(&path, true, memory()).load().await.unwrap(), 0);
    }

    #[test]
    fn empty_path_disables_snapshots() {
        let cfg = ServerConfig { file_storage_path: "  ".into(), ..ServerConfig::default() };
        assert!(Snapshotter::from_config(&cfg, memory()).is_none());

        let cfg = ServerConfig::default();
        let snap = Snapshotter::from_config(&cfg, memory()).unwrap();
        assert_eq!(snap.path(), Path::new("tmp/metrics.json"));
    }
}
