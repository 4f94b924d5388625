//! In-process metric collection.
//!
//! Poll and report run on separate tasks, so both maps sit behind one mutex.
//! Counters accumulate between reports; a delivered delta is subtracted with
//! [`Collector::acknowledge`] so the next report carries only what is new.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use metricsd_core::{Metric, MetricValue, MetricsError, Result};

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

#[derive(Debug, Default)]
struct Inner {
    gauges: BTreeMap<String, f64>,
    counters: BTreeMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct Collector {
    inner: Mutex<Inner>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| MetricsError::Internal("collector lock poisoned".into()))
    }

    /// Take one sample: process gauges, `RandomValue`, and `PollCount += 1`.
    pub fn poll(&self) -> Result<()> {
        let process = read_process_gauges();
        let random: f64 = rand::random();

        let mut inner = self.lock()?;
        for (name, v) in process {
            inner.gauges.insert(name.to_string(), v);
        }
        inner.gauges.insert(RANDOM_VALUE.to_string(), random);
        let polls = inner.counters.entry(POLL_COUNT.to_string()).or_insert(0);
        *polls = polls.saturating_add(1);
        Ok(())
    }

    pub fn set_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.lock()?.gauges.insert(name.to_string(), value);
        Ok(())
    }

    pub fn add_counter(&self, name: &str, delta: i64) -> Result<()> {
        let mut inner = self.lock()?;
        let slot = inner.counters.entry(name.to_string()).or_insert(0);
        *slot = slot.saturating_add(delta);
        Ok(())
    }

    /// Owned copy of the current values: gauges then counters, by name.
    pub fn snapshot(&self) -> Result<Vec<Metric>> {
        let inner = self.lock()?;
        let mut out = Vec::with_capacity(inner.gauges.len() + inner.counters.len());
        out.extend(inner.gauges.iter().map(|(k, v)| Metric::gauge(k.clone(), *v)));
        out.extend(inner.counters.iter().map(|(k, d)| Metric::counter(k.clone(), *d)));
        Ok(out)
    }

    /// Subtract delivered counter deltas. Polls that happened during the
    /// report stay in the counter for the next one.
    pub fn acknowledge(&self, delivered: &[Metric]) -> Result<()> {
        let mut inner = self.lock()?;
        for m in delivered {
            if let MetricValue::Counter(d) = m.value {
                if let Some(slot) = inner.counters.get_mut(&m.name) {
                    *slot = slot.saturating_sub(d);
                }
            }
        }
        Ok(())
    }

    /// `(gauges, counters)`
    pub fn counts(&self) -> Result<(usize, usize)> {
        let inner = self.lock()?;
        Ok((inner.gauges.len(), inner.counters.len()))
    }
}

#[cfg(target_os = "linux")]
fn read_process_gauges() -> Vec<(&'static str, f64)> {
    let mut out = Vec::new();
    match std::fs::read_to_string("/proc/self/status") {
        Ok(s) => out.extend(parse_status(&s)),
        Err(e) => tracing::debug!(error = %e, "read /proc/self/status failed"),
    }
    match std::fs::read_to_string("/proc/self/stat") {
        Ok(s) => out.extend(parse_stat(&s)),
        Err(e) => tracing::debug!(error = %e, "read /proc/self/stat failed"),
    }
    out
}

#[cfg(not(target_os = "linux"))]
fn read_process_gauges() -> Vec<(&'static str, f64)> {
    Vec::new()
}

/// Memory sizes (bytes) and thread count from `/proc/<pid>/status`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_status(s: &str) -> Vec<(&'static str, f64)> {
    const FIELDS: [(&str, &str); 6] = [
        ("VmSize:", "VirtualMemory"),
        ("VmRSS:", "ResidentMemory"),
        ("RssShmem:", "SharedMemory"),
        ("VmExe:", "TextMemory"),
        ("VmData:", "DataMemory"),
        ("Threads:", "Threads"),
    ];

    let mut out = Vec::new();
    for line in s.lines() {
        for (prefix, name) in FIELDS {
            let Some(rest) = line.strip_prefix(prefix) else { continue };
            let mut parts = rest.split_whitespace();
            let Some(Ok(n)) = parts.next().map(str::parse::<f64>) else { continue };
            let scale = if parts.next() == Some("kB") { 1024.0 } else { 1.0 };
            out.push((name, n * scale));
        }
    }
    out
}

/// Page faults and CPU time (clock ticks) from `/proc/<pid>/stat`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat(s: &str) -> Vec<(&'static str, f64)> {
    // comm may contain spaces; fields are counted after its closing paren,
    // which is field 2, so field n sits at index n - 3.
    let Some((_, rest)) = s.rsplit_once(')') else { return Vec::new() };
    let fields: Vec<&str> = rest.split_whitespace().collect();

    [(10, "MinorFaults"), (12, "MajorFaults"), (14, "UserTime"), (15, "SystemTime")]
        .into_iter()
        .filter_map(|(n, name)| {
            let v = fields.get(n - 3)?.parse::<f64>().ok()?;
            Some((name, v))
        })
        .collect()
}
