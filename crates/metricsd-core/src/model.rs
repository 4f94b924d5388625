//! Metric data model.
//!
//! A [`Metric`] is identified by `(kind, name)` and carries exactly one payload:
//! a float for gauges, an integer delta for counters. The wire shape
//! (`{id, type, value?, delta?}`) lives in [`MetricRecord`]; conversion from a
//! record is fallible, so a `Metric` that crossed a boundary is always valid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Metric namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricsError::invalid(format!(
                "unknown metric type: {other} (use 'gauge' or 'counter')"
            ))),
        }
    }
}

/// Kind-tagged payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Last write wins.
    Gauge(f64),
    /// Added to the stored value.
    Counter(i64),
}

/// One data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricRecord", try_from = "MetricRecord")]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value: MetricValue::Gauge(value) }
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self { name: name.into(), value: MetricValue::Counter(delta) }
    }

    pub fn kind(&self) -> MetricKind {
        match self.value {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }
}

/// Wire shape used by ingestion endpoints, the delivery client and the
/// snapshot file. Any combination of fields may arrive; validation happens in
/// [`MetricRecord::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub mtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricRecord {
    /// Request shape for point reads (`{id, type}` only).
    pub fn key(kind: MetricKind, name: impl Into<String>) -> Self {
        Self { id: name.into(), mtype: kind.as_str().to_string(), value: None, delta: None }
    }

    /// Every problem with this record, empty when it is a valid metric.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.id.is_empty() {
            out.push("id is required".to_string());
        }
        match self.mtype.parse::<MetricKind>() {
            Ok(MetricKind::Gauge) => {
                match self.value {
                    None => out.push("gauge value is required".to_string()),
                    Some(v) if !v.is_finite() => out.push("gauge value must be finite".to_string()),
                    Some(_) => {}
                }
                if self.delta.is_some() {
                    out.push("gauge must not carry delta".to_string());
                }
            }
            Ok(MetricKind::Counter) => {
                if self.delta.is_none() {
                    out.push("counter delta is required".to_string());
                }
                if self.value.is_some() {
                    out.push("counter must not carry value".to_string());
                }
            }
            Err(_) => out.push(format!("unknown metric type: {:?}", self.mtype)),
        }
        out
    }

    /// Convert into a [`Metric`] or report all problems at once.
    pub fn validate(self) -> Result<Metric> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(MetricsError::Validation(problems));
        }
        let value = match (self.value, self.delta) {
            (Some(v), None) => MetricValue::Gauge(v),
            (None, Some(d)) => MetricValue::Counter(d),
            _ => return Err(MetricsError::Internal("record passed validation without a single payload".into())),
        };
        Ok(Metric { name: self.id, value })
    }

    /// Lookup key `(kind, name)` of a read request.
    pub fn lookup_key(&self) -> Result<(MetricKind, &str)> {
        let kind = self.mtype.parse::<MetricKind>()?;
        if self.id.is_empty() {
            return Err(MetricsError::invalid("id is required"));
        }
        Ok((kind, self.id.as_str()))
    }
}

impl From<Metric> for MetricRecord {
    fn from(m: Metric) -> Self {
        let mtype = m.kind().as_str().to_string();
        match m.value {
            MetricValue::Gauge(v) => Self { id: m.name, mtype, value: Some(v), delta: None },
            MetricValue::Counter(d) => Self { id: m.name, mtype, value: None, delta: Some(d) },
        }
    }
}

impl TryFrom<MetricRecord> for Metric {
    type Error = MetricsError;

    fn try_from(r: MetricRecord) -> Result<Self> {
        r.validate()
    }
}

/// Parse the plaintext value of `/update/{type}/{name}/{value}`.
pub fn parse_path_value(kind: MetricKind, raw: &str) -> Result<MetricValue> {
    match kind {
        MetricKind::Gauge => {
            let v: f64 = raw
                .parse()
                .map_err(|_| MetricsError::invalid(format!("invalid gauge value: {raw}")))?;
            if !v.is_finite() {
                return Err(MetricsError::invalid(format!("gauge value must be finite: {raw}")));
            }
            Ok(MetricValue::Gauge(v))
        }
        MetricKind::Counter => raw
            .parse()
            .map(MetricValue::Counter)
            .map_err(|_| MetricsError::invalid(format!("invalid counter value: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn record_roundtrip_keeps_single_payload() {
        let json = serde_json::to_string(&Metric::counter("PollCount", 5)).unwrap();
        assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":5}"#);

        let g: Metric = serde_json::from_str(r#"{"id":"Alloc","type":"gauge","value":1024.5}"#).unwrap();
        assert_eq!(g, Metric::gauge("Alloc", 1024.5));
    }

    #[test]
    fn both_payloads_are_rejected() {
        let err = serde_json::from_str::<Metric>(r#"{"id":"x","type":"gauge","value":1.0,"delta":2}"#)
            .expect_err("must fail");
        assert!(err.to_string().contains("gauge must not carry delta"));
    }

    #[test]
    fn problems_are_collected_together() {
        let r = MetricRecord { id: String::new(), mtype: "counter".into(), value: Some(1.0), delta: None };
        let problems = r.problems();
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        let r = MetricRecord { id: "x".into(), mtype: "histogram".into(), value: Some(1.0), delta: None };
        match r.validate() {
            Err(MetricsError::Validation(p)) => assert!(p[0].contains("histogram")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn path_values() {
        assert_eq!(parse_path_value(MetricKind::Gauge, "12.5").unwrap(), MetricValue::Gauge(12.5));
        assert_eq!(parse_path_value(MetricKind::Counter, "-3").unwrap(), MetricValue::Counter(-3));
        assert!(parse_path_value(MetricKind::Counter, "1.5").is_err());
        assert!(parse_path_value(MetricKind::Gauge, "NaN").is_err());
        assert!(parse_path_value(MetricKind::Gauge, "abc").is_err());
    }
}
