//! Batch validation and deduplication.
//!
//! Validation runs over the whole batch before anything is merged, and every
//! problem is reported (prefixed with the item index) so a client can fix a
//! batch in one round trip. Reconciliation collapses duplicate `(kind, name)`
//! pairs: the last gauge value wins, counter deltas are summed. Output order is
//! the order of first appearance.

use std::collections::HashMap;

use crate::error::{MetricsError, Result};
use crate::model::{Metric, MetricKind, MetricRecord, MetricValue};

/// Validate every record; reject the whole batch on any problem.
pub fn validate_batch(records: Vec<MetricRecord>) -> Result<Vec<Metric>> {
    if records.is_empty() {
        return Err(MetricsError::invalid("empty batch"));
    }

    let mut problems = Vec::new();
    for (i, r) in records.iter().enumerate() {
        problems.extend(r.problems().into_iter().map(|p| format!("metric[{i}]: {p}")));
    }
    if !problems.is_empty() {
        return Err(MetricsError::Validation(problems));
    }

    records.into_iter().map(MetricRecord::validate).collect()
}

/// Collapse duplicates into one entry per `(kind, name)`.
pub fn reconcile(metrics: Vec<Metric>) -> Vec<Metric> {
    let mut index: HashMap<(MetricKind, String), usize> = HashMap::with_capacity(metrics.len());
    let mut out: Vec<Metric> = Vec::with_capacity(metrics.len());

    for m in metrics {
        let key = (m.kind(), m.name.clone());
        match index.get(&key) {
            Some(&slot) => {
                let merged = &mut out[slot].value;
                match (merged, m.value) {
                    (MetricValue::Gauge(cur), MetricValue::Gauge(v)) => *cur = v,
                    (MetricValue::Counter(cur), MetricValue::Counter(d)) => *cur = cur.saturating_add(d),
                    // Keys include the kind, so mixed pairs never share a slot.
                    _ => {}
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(m);
            }
        }
    }
    out
}

/// Validate then reconcile: the input of a single `apply_batch` call.
pub fn prepare_batch(records: Vec<MetricRecord>) -> Result<Vec<Metric>> {
    validate_batch(records).map(reconcile)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    fn gauge(id: &str, v: f64) -> MetricRecord {
        MetricRecord { id: id.into(), mtype: "gauge".into(), value: Some(v), delta: None }
    }

    fn counter(id: &str, d: i64) -> MetricRecord {
        MetricRecord { id: id.into(), mtype: "counter".into(), value: None, delta: Some(d) }
    }

    #[test]
    fn last_gauge_wins() {
        let out = prepare_batch(vec![gauge("x", 1.0), gauge("x", 2.0)]).unwrap();
        assert_eq!(out, vec![Metric::gauge("x", 2.0)]);
    }

    #[test]
    fn counter_deltas_sum_once() {
        let out = prepare_batch(vec![counter("c", 3), counter("c", 4)]).unwrap();
        assert_eq!(out, vec![Metric::counter("c", 7)]);
    }

    #[test]
    fn same_name_different_kind_stays_distinct() {
        let out = prepare_batch(vec![gauge("m", 1.5), counter("m", 2), gauge("m", 0.5), counter("m", 1)]).unwrap();
        assert_eq!(out, vec![Metric::gauge("m", 0.5), Metric::counter("m", 3)]);
    }

    #[test]
    fn first_appearance_order_is_kept() {
        let out = prepare_batch(vec![counter("b", 1), gauge("a", 1.0), counter("b", 1), gauge("z", 9.0)]).unwrap();
        let names: Vec<_> = out.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "z"]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        match prepare_batch(Vec::new()) {
            Err(MetricsError::Validation(p)) => assert_eq!(p, vec!["empty batch".to_string()]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn all_problems_are_reported() {
        let bad = vec![
            gauge("ok", 1.0),
            MetricRecord { id: "".into(), mtype: "gauge".into(), value: Some(1.0), delta: None },
            MetricRecord { id: "c".into(), mtype: "counter".into(), value: None, delta: None },
            MetricRecord { id: "h".into(), mtype: "histogram".into(), value: None, delta: None },
        ];
        match prepare_batch(bad) {
            Err(MetricsError::Validation(p)) => {
                assert_eq!(p.len(), 3, "{p:?}");
                assert!(p[0].starts_with("metric[1]:"));
                assert!(p[1].starts_with("metric[2]:"));
                assert!(p[2].starts_with("metric[3]:"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
