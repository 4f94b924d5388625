//! Agent config loader: defaults, optional YAML file, then flags/env.

pub mod cli;
pub mod schema;

use std::fs;
use std::path::Path;

use metricsd_core::error::{MetricsError, Result};

pub use cli::AgentArgs;
pub use schema::{AgentConfig, ReportMode};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<AgentConfig> {
    let cfg = parse_file(path.as_ref())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<AgentConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Strict parse only. Values are checked once flags have been applied.
fn parse_file(path: &Path) -> Result<AgentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetricsError::Config(format!("read {} failed: {e}", path.display())))?;
    parse_str(&s)
}

fn parse_str(s: &str) -> Result<AgentConfig> {
    serde_yaml::from_str(s).map_err(|e| MetricsError::Config(format!("invalid yaml: {e}")))
}

pub fn resolve(args: &AgentArgs) -> Result<AgentConfig> {
    let mut cfg = match &args.config {
        Some(path) => parse_file(path)?,
        None => AgentConfig::default(),
    };
    args.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}
