//! Ingestion handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use metricsd_core::model::parse_path_value;
use metricsd_core::reconcile::prepare_batch;
use metricsd_core::{Metric, MetricKind, MetricRecord, MetricValue, MetricsError};

use super::ApiError;
use crate::app_state::AppState;

/// `POST /update/{type}/{name}/{value}`
pub async fn by_path(
    State(state): State<AppState>,
    Path((kind, name, raw)): Path<(String, String, String)>,
) -> Result<&'static str, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let value = parse_path_value(kind, &raw)?;
    apply_one(&state, &Metric { name, value }).await?;
    Ok("OK")
}

/// `POST /update` with a single JSON record; responds with the stored record.
pub async fn by_json(
    State(state): State<AppState>,
    body: Result<Json<MetricRecord>, JsonRejection>,
) -> Result<Json<MetricRecord>, ApiError> {
    let Json(record) = body?;
    let metric = record.validate()?;
    apply_one(&state, &metric).await?;

    let kind = metric.kind();
    let stored = state
        .store()
        .read(kind, &metric.name)
        .await?
        .ok_or_else(|| MetricsError::Internal(format!("{kind} {} vanished after update", metric.name)))?;
    Ok(Json(stored.into()))
}

/// `POST /updates` with a JSON array; the batch is validated as a whole,
/// deduplicated, then applied in one call.
pub async fn batch(
    State(state): State<AppState>,
    body: Result<Json<Vec<MetricRecord>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(records) = body?;
    let received = records.len();
    let batch = prepare_batch(records)?;
    state.store().apply_batch(&batch).await?;

    tracing::debug!(received, applied = batch.len(), "batch applied");
    Ok(Json(json!({ "status": "ok", "applied": batch.len() })))
}

async fn apply_one(state: &AppState, m: &Metric) -> Result<(), MetricsError> {
    match m.value {
        MetricValue::Gauge(v) => state.store().upsert_gauge(&m.name, v).await,
        MetricValue::Counter(d) => state.store().increment_counter(&m.name, d).await,
    }
}
