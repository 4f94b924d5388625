use std::path::PathBuf;

use clap::Parser;

use super::ServerConfig;

/// Command-line flags. Each flag also reads its environment variable; both
/// override the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "metricsd-server", version, about = "Metrics aggregation server")]
pub struct ServerArgs {
    /// YAML config file.
    #[arg(short = 'c', long = "config", env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address (host:port).
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    #[arg(short = 'l', long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Snapshot interval in seconds, 0 = save after every update.
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    pub store_interval: Option<u64>,

    /// Snapshot file; an empty value disables snapshots.
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    pub file_storage_path: Option<String>,

    /// Load the snapshot at startup. A bare `-r` means `true`.
    #[arg(short = 'r', long, env = "RESTORE", num_args = 0..=1, default_missing_value = "true")]
    pub restore: Option<bool>,

    /// SQLite database path (optionally `sqlite://…`); empty = in-memory store.
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,
}

impl ServerArgs {
    pub fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(v) = &self.address {
            cfg.address = v.clone();
        }
        if let Some(v) = &self.log_level {
            cfg.log_level = v.clone();
        }
        if let Some(v) = self.store_interval {
            cfg.store_interval = v;
        }
        if let Some(v) = &self.file_storage_path {
            cfg.file_storage_path = v.clone();
        }
        if let Some(v) = self.restore {
            cfg.restore = v;
        }
        if let Some(v) = &self.database_dsn {
            cfg.database_dsn = v.clone();
        }
    }
}
