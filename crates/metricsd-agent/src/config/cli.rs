use std::path::PathBuf;

use clap::Parser;

use super::{AgentConfig, ReportMode};

/// Command-line flags. Each flag also reads its environment variable; both
/// override the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "metricsd-agent", version, about = "Metrics collection agent")]
pub struct AgentArgs {
    /// YAML config file.
    #[arg(short = 'c', long = "config", env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Server address (host:port or URL).
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    #[arg(short = 'l', long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Seconds between samples.
    #[arg(short = 'p', long, env = "POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Seconds between reports.
    #[arg(short = 'r', long, env = "REPORT_INTERVAL")]
    pub report_interval: Option<u64>,

    #[arg(long, value_enum, env = "REPORT_MODE")]
    pub mode: Option<ReportMode>,
}

impl AgentArgs {
    pub fn apply(&self, cfg: &mut AgentConfig) {
        if let Some(v) = &self.address {
            cfg.address = v.clone();
        }
        if let Some(v) = &self.log_level {
            cfg.log_level = v.clone();
        }
        if let Some(v) = self.poll_interval {
            cfg.poll_interval = v;
        }
        if let Some(v) = self.report_interval {
            cfg.report_interval = v;
        }
        if let Some(v) = self.mode {
            cfg.mode = v;
        }
    }
}
