//! metricsd server library entry.
//!
//! Wires the aggregation store, snapshot persistence and the HTTP ingestion
//! surface. Consumed by the binary (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod config;
pub mod ops;
pub mod router;
pub mod snapshot;
pub mod store;
