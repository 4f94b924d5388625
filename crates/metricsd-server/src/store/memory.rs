//! Volatile store: two maps behind one `RwLock`.
//!
//! Every read and write goes through the lock, including `read_all`, so a
//! snapshot never interleaves with a half-applied batch.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use metricsd_core::{Metric, MetricValue, MetricsError, Result};

use super::{MetricStore, MetricsSnapshot};

#[derive(Debug, Default)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

impl Maps {
    fn apply(&mut self, m: &Metric) {
        match m.value {
            MetricValue::Gauge(v) => {
                self.gauges.insert(m.name.clone(), v);
            }
            MetricValue::Counter(d) => {
                let slot = self.counters.entry(m.name.clone()).or_insert(0);
                *slot = slot.saturating_add(d);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    maps: RwLock<Maps>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoned lock means a writer panicked mid-update; report instead of panicking again.
    fn read_maps(&self) -> Result<RwLockReadGuard<'_, Maps>> {
        self.maps
            .read()
            .map_err(|_| MetricsError::Internal("memory store lock poisoned".into()))
    }

    fn write_maps(&self) -> Result<RwLockWriteGuard<'_, Maps>> {
        self.maps
            .write()
            .map_err(|_| MetricsError::Internal("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.write_maps()?.gauges.insert(name.to_string(), value);
        Ok(())
    }

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<()> {
        let mut maps = self.write_maps()?;
        let slot = maps.counters.entry(name.to_string()).or_insert(0);
        *slot = slot.saturating_add(delta);
        Ok(())
    }

    async fn set_counter(&self, name: &str, value: i64) -> Result<()> {
        self.write_maps()?.counters.insert(name.to_string(), value);
        Ok(())
    }

    async fn apply_batch(&self, batch: &[Metric]) -> Result<()> {
        let mut maps = self.write_maps()?;
        for m in batch {
            maps.apply(m);
        }
        Ok(())
    }

    async fn read_gauge(&self, name: &str) -> Result<Option<f64>> {
        Ok(self.read_maps()?.gauges.get(name).copied())
    }

    async fn read_counter(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.read_maps()?.counters.get(name).copied())
    }

    async fn read_all(&self) -> Result<MetricsSnapshot> {
        let maps = self.read_maps()?;
        Ok(MetricsSnapshot {
            gauges: maps.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            counters: maps.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.read_maps().map(|_| ())
    }
}
