//! metricsd agent
//!
//! - Poll timer: sample process telemetry into the collector
//! - Report timer: deliver to the server (batch, per-metric or JSON mode)
//! - SIGINT/SIGTERM stop both loops; in-flight retries are cancelled

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use metricsd_agent::config::{self, AgentArgs, AgentConfig};
use metricsd_agent::{runner, Collector, Sender};
use metricsd_core::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let args = AgentArgs::parse();
    let cfg = match config::resolve(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("metricsd-agent: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    fmt().with_env_filter(filter).init();

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "metricsd-agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: AgentConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let collector = Arc::new(Collector::new());
    let sender = Arc::new(Sender::new(
        &cfg.base_url(),
        cfg.request_timeout(),
        cfg.retry.policy(),
        shutdown.clone(),
    )?);

    tracing::info!(
        server = %cfg.base_url(),
        poll_interval = cfg.poll_interval,
        report_interval = cfg.report_interval,
        mode = ?cfg.mode,
        "metricsd-agent starting"
    );

    let poller = runner::spawn_poller(Arc::clone(&collector), cfg.poll_every(), shutdown.clone());
    let reporter = runner::spawn_reporter(
        collector,
        sender,
        cfg.report_every(),
        cfg.mode,
        shutdown.clone(),
    );

    shutdown_signal().await;
    shutdown.cancel();

    let stopped = tokio::time::timeout(cfg.shutdown_timeout(), async {
        for (name, task) in [("poller", poller), ("reporter", reporter)] {
            if let Err(e) = task.await {
                tracing::warn!(task = name, error = %e, "task ended abnormally");
            }
        }
    })
    .await;
    if stopped.is_err() {
        tracing::warn!(timeout_ms = cfg.shutdown_timeout_ms, "shutdown timed out");
    }

    tracing::info!("metricsd-agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, shutting down");
}
