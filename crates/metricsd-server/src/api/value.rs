//! Point reads.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use metricsd_core::{Metric, MetricKind, MetricRecord, MetricValue, MetricsError};

use super::ApiError;
use crate::app_state::AppState;

/// `GET /value/{type}/{name}`: the bare value as text.
pub async fn by_path(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let metric = lookup(&state, kind, &name).await?;
    Ok(format_value(&metric.value))
}

/// `POST /value` with `{id, type}`.
pub async fn by_json(
    State(state): State<AppState>,
    body: Result<Json<MetricRecord>, JsonRejection>,
) -> Result<Json<MetricRecord>, ApiError> {
    let Json(record) = body?;
    let (kind, name) = record.lookup_key()?;
    let metric = lookup(&state, kind, name).await?;
    Ok(Json(metric.into()))
}

async fn lookup(state: &AppState, kind: MetricKind, name: &str) -> Result<Metric, MetricsError> {
    state
        .store()
        .read(kind, name)
        .await?
        .ok_or_else(|| MetricsError::NotFound { kind, name: name.to_string() })
}

/// Counters as integers, gauges in shortest round-trip form (`1024`, `0.5`).
pub fn format_value(v: &MetricValue) -> String {
    match v {
        MetricValue::Gauge(g) => g.to_string(),
        MetricValue::Counter(c) => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_compactly() {
        assert_eq!(format_value(&MetricValue::Gauge(1024.0)), "1024");
        assert_eq!(format_value(&MetricValue::Gauge(0.125)), "0.125");
        assert_eq!(format_value(&MetricValue::Counter(-3)), "-3");
    }
}
