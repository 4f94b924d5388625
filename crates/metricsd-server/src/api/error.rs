//! HTTP mapping of [`MetricsError`].

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use metricsd_core::error::ClientCode;
use metricsd_core::MetricsError;

/// Handler error: a core error rendered as `{"error", "message", "details"?}`.
#[derive(Debug)]
pub struct ApiError(pub MetricsError);

impl From<MetricsError> for ApiError {
    fn from(e: MetricsError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError(MetricsError::invalid(r.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.client_code() {
            ClientCode::BadRequest => StatusCode::BAD_REQUEST,
            ClientCode::NotFound => StatusCode::NOT_FOUND,
            ClientCode::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ClientCode::Storage | ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let mut body = json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        });
        if let MetricsError::Validation(details) = &self.0 {
            body["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricsd_core::MetricKind;

    #[test]
    fn status_follows_client_code() {
        let cases = [
            (MetricsError::invalid("x"), StatusCode::BAD_REQUEST),
            (
                MetricsError::NotFound { kind: MetricKind::Gauge, name: "g".into() },
                StatusCode::NOT_FOUND,
            ),
            (MetricsError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (MetricsError::fatal_storage("no such table"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                MetricsError::RetriesExhausted {
                    attempts: 3,
                    source: Box::new(MetricsError::retriable_storage("locked")),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
