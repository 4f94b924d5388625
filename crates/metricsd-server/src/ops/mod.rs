//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/ping`    : storage backend health

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::api::ApiError;
use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn ping(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.store().ping().await?;
    Ok("OK")
}
