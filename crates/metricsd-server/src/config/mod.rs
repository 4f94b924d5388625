//! Server config loader.
//!
//! Layering: built-in defaults, then the optional YAML file (strict parsing),
//! then CLI flags / environment variables, then `validate()`.

pub mod cli;
pub mod schema;

use std::fs;
use std::path::Path;

use metricsd_core::error::{MetricsError, Result};

pub use cli::ServerArgs;
pub use schema::ServerConfig;

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let cfg = parse_file(path.as_ref())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Strict parse only. Values are checked once flags have been applied.
fn parse_file(path: &Path) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetricsError::Config(format!("read {} failed: {e}", path.display())))?;
    parse_str(&s)
}

fn parse_str(s: &str) -> Result<ServerConfig> {
    serde_yaml::from_str(s).map_err(|e| MetricsError::Config(format!("invalid yaml: {e}")))
}

/// Build the effective config from parsed command-line arguments.
pub fn resolve(args: &ServerArgs) -> Result<ServerConfig> {
    let mut cfg = match &args.config {
        Some(path) => parse_file(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}
