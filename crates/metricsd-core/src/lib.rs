//! metricsd core: metric model, batch reconciliation, retry policy and errors.
//!
//! This crate defines the data contracts shared by the server (aggregation
//! store, snapshot persistence, ingestion) and the agent (delivery client). It
//! carries no HTTP or database dependencies; the only runtime pieces are the
//! tokio timer and cancellation token used by the retry loop.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed metrics surface as `MetricsError::Validation`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod model;
pub mod reconcile;
pub mod retry;

/// Shared result type.
pub use error::{Result, MetricsError};
pub use model::{Metric, MetricKind, MetricRecord, MetricValue};
pub use retry::{RetryPolicy, RetrySection};
