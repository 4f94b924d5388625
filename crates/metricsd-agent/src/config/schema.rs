use std::time::Duration;

use serde::Deserialize;
use metricsd_core::error::{MetricsError, Result};
use metricsd_core::RetrySection;

/// How one report cycle is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    /// One JSON array to `/updates/`.
    #[default]
    Batch,
    /// One `/update/{type}/{name}/{value}` request per metric.
    PerMetric,
    /// One JSON record to `/update/` per metric.
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Server address; `http://` is assumed when no scheme is given.
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between samples.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Seconds between reports.
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,

    #[serde(default)]
    pub mode: ReportMode,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
            poll_interval: default_poll_interval(),
            report_interval: default_report_interval(),
            mode: ReportMode::default(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            retry: RetrySection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(MetricsError::Config("address must not be empty".into()));
        }
        reqwest::Url::parse(&self.base_url())
            .map_err(|e| MetricsError::Config(format!("address {:?} is not a valid URL: {e}", self.address)))?;
        if self.poll_interval == 0 {
            return Err(MetricsError::Config("poll_interval must be greater than 0".into()));
        }
        if self.report_interval == 0 {
            return Err(MetricsError::Config("report_interval must be greater than 0".into()));
        }
        if !(1..=60_000).contains(&self.request_timeout_ms) {
            return Err(MetricsError::Config(
                "request_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        if !(100..=120_000).contains(&self.shutdown_timeout_ms) {
            return Err(MetricsError::Config(
                "shutdown_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        self.retry.validate("retry")?;
        Ok(())
    }

    /// Address with a scheme.
    pub fn base_url(&self) -> String {
        let addr = self.address.trim();
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        }
    }

    pub fn poll_every(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn report_every(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_address() -> String {
    "localhost:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_poll_interval() -> u64 {
    2
}
fn default_report_interval() -> u64 {
    10
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
