use std::time::Duration;

use serde::Deserialize;
use metricsd_core::error::{MetricsError, Result};
use metricsd_core::RetrySection;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between snapshot saves; 0 saves after every update.
    #[serde(default = "default_store_interval")]
    pub store_interval: u64,

    /// Empty disables snapshots entirely.
    #[serde(default = "default_file_storage_path")]
    pub file_storage_path: String,

    #[serde(default = "default_restore")]
    pub restore: bool,

    /// Empty selects the in-memory store.
    #[serde(default)]
    pub database_dsn: String,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
            store_interval: default_store_interval(),
            file_storage_path: default_file_storage_path(),
            restore: default_restore(),
            database_dsn: String::new(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            retry: RetrySection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.address)?;
        if self.log_level.trim().is_empty() {
            return Err(MetricsError::Config("log_level must not be empty".into()));
        }
        if !(100..=120_000).contains(&self.shutdown_timeout_ms) {
            return Err(MetricsError::Config(
                "shutdown_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        self.retry.validate("retry")?;
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn snapshots_enabled(&self) -> bool {
        !self.file_storage_path.trim().is_empty()
    }
}

/// `host:port` with a numeric port; the host is resolved at bind time.
pub(crate) fn validate_address(address: &str) -> Result<()> {
    let port = address
        .rsplit_once(':')
        .filter(|(host, _)| !host.is_empty())
        .map(|(_, port)| port);
    match port.map(str::parse::<u16>) {
        Some(Ok(_)) => Ok(()),
        _ => Err(MetricsError::Config(format!(
            "address must look like host:port, got {address:?}"
        ))),
    }
}

fn default_address() -> String {
    "localhost:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_store_interval() -> u64 {
    300
}
fn default_file_storage_path() -> String {
    "tmp/metrics.json".into()
}
fn default_restore() -> bool {
    true
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
