//! Shared error type across metricsd crates.

use thiserror::Error;

use crate::model::MetricKind;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Malformed or incomplete metric, empty batch.
    BadRequest,
    /// Requested metric is absent.
    NotFound,
    /// Backend failure (retries exhausted or fatal).
    Storage,
    /// Operation aborted by shutdown.
    Cancelled,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Storage => "STORAGE",
            ClientCode::Cancelled => "CANCELLED",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Classification of a backend fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Transient (busy, locked, I/O hiccup); worth another attempt.
    Retriable,
    /// Bad statement, constraint violation, closed backend.
    Fatal,
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core, server and agent.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{kind} metric not found: {name}")]
    NotFound { kind: MetricKind, name: String },
    #[error("storage ({fault:?}): {message}")]
    Storage { fault: StorageFault, message: String },
    #[error("all {attempts} attempts failed, last error: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<MetricsError>,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("snapshot: {0}")]
    Persistence(String),
    #[error("delivery: {message}")]
    Delivery { retriable: bool, message: String },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Single-message validation error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        MetricsError::Validation(vec![msg.into()])
    }

    pub fn retriable_storage(msg: impl Into<String>) -> Self {
        MetricsError::Storage { fault: StorageFault::Retriable, message: msg.into() }
    }

    pub fn fatal_storage(msg: impl Into<String>) -> Self {
        MetricsError::Storage { fault: StorageFault::Fatal, message: msg.into() }
    }

    /// Whether the retry policy may attempt the operation again.
    pub fn is_retriable(&self) -> bool {
        match self {
            MetricsError::Storage { fault, .. } => *fault == StorageFault::Retriable,
            MetricsError::Delivery { retriable, .. } => *retriable,
            _ => false,
        }
    }

    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetricsError::Validation(_) => ClientCode::BadRequest,
            MetricsError::NotFound { .. } => ClientCode::NotFound,
            MetricsError::Storage { .. } | MetricsError::RetriesExhausted { .. } => ClientCode::Storage,
            MetricsError::Cancelled => ClientCode::Cancelled,
            MetricsError::Persistence(_)
            | MetricsError::Delivery { .. }
            | MetricsError::Config(_)
            | MetricsError::Internal(_) => ClientCode::Internal,
        }
    }
}
