//! metricsd agent library entry.
//!
//! The collector samples process telemetry on a poll timer; the sender
//! delivers it to the server on a report timer, retrying transient failures
//! with the shared backoff policy.

pub mod collector;
pub mod config;
pub mod runner;
pub mod sender;

pub use collector::Collector;
pub use config::{AgentConfig, ReportMode};
pub use sender::{SendReport, Sender};
