//! Aggregation store (capability interface + backends).
//!
//! Both backends honor the same contract:
//! - gauges: last write wins
//! - counters: `increment_counter` adds (absent = 0), `set_counter` replaces
//! - `apply_batch` takes a reconciled batch; counters in it are increments
//! - reads return `None` for a missing metric, never a zero placeholder
//! - `read_all` returns owned copies taken under one consistent view
//!
//! The concrete backend is chosen once in [`open`] and injected into
//! [`crate::app_state::AppState`] as `Arc<dyn MetricStore>`.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use metricsd_core::{Metric, MetricKind, Result, RetryPolicy};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::ServerConfig;

/// Owned copy of the full store state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, i64>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// Flatten into metrics: gauges first, then counters, each sorted by name.
    pub fn into_metrics(self) -> Vec<Metric> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.gauges.into_iter().map(|(name, v)| Metric::gauge(name, v)));
        out.extend(self.counters.into_iter().map(|(name, d)| Metric::counter(name, d)));
        out
    }
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Short backend name for logs (`memory`, `sqlite`).
    fn backend(&self) -> &'static str;

    async fn upsert_gauge(&self, name: &str, value: f64) -> Result<()>;

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<()>;

    /// Replace a counter with an absolute value (snapshot restore).
    async fn set_counter(&self, name: &str, value: i64) -> Result<()>;

    async fn apply_batch(&self, batch: &[Metric]) -> Result<()>;

    async fn read_gauge(&self, name: &str) -> Result<Option<f64>>;

    async fn read_counter(&self, name: &str) -> Result<Option<i64>>;

    async fn read_all(&self) -> Result<MetricsSnapshot>;

    /// Backend health check.
    async fn ping(&self) -> Result<()>;

    /// Read one metric by key, `None` when absent.
    async fn read(&self, kind: MetricKind, name: &str) -> Result<Option<Metric>> {
        Ok(match kind {
            MetricKind::Gauge => self.read_gauge(name).await?.map(|v| Metric::gauge(name, v)),
            MetricKind::Counter => self.read_counter(name).await?.map(|d| Metric::counter(name, d)),
        })
    }
}

/// Select the backend once at startup.
///
/// A configured DSN selects SQLite; when it cannot be opened the server keeps
/// running on the volatile store.
pub async fn open(
    cfg: &ServerConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
) -> Arc<dyn MetricStore> {
    if cfg.database_dsn.is_empty() {
        tracing::info!("no database configured, using in-memory store");
        return Arc::new(MemoryStore::new());
    }

    match SqliteStore::open(&cfg.database_dsn, retry, cancel).await {
        Ok(store) => {
            tracing::info!(dsn = %cfg.database_dsn, "sqlite store ready");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(dsn = %cfg.database_dsn, error = %e, "database unavailable, falling back to in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}
