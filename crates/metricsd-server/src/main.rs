//! metricsd server
//!
//! - Aggregation store: SQLite when `database_dsn` is set, memory otherwise
//! - Snapshot: restored at start, saved per update (interval 0) or on a timer
//! - Graceful shutdown: drain HTTP, final save bounded by `shutdown_timeout_ms`

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use metricsd_core::{MetricsError, Result};
use metricsd_server::config::{self, ServerArgs, ServerConfig};
use metricsd_server::snapshot::{schedule, SaveMode, Snapshotter};
use metricsd_server::{app_state::AppState, router, store};

#[tokio::main]
async fn main() -> ExitCode {
    let args = ServerArgs::parse();
    let cfg = match config::resolve(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("metricsd-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    fmt().with_env_filter(filter).init();

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "metricsd-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: ServerConfig) -> Result<()> {
    // Store work is cancelled only after the final save.
    let store_cancel = CancellationToken::new();
    let shutdown = CancellationToken::new();

    let store = store::open(&cfg, cfg.retry.policy(), store_cancel.clone()).await;
    let snapshotter = Snapshotter::from_config(&cfg, Arc::clone(&store)).map(Arc::new);
    if let Some(s) = &snapshotter {
        s.load().await?;
    }

    let mode = SaveMode::from_secs(cfg.store_interval);
    let (sync_saver, interval_saver) = match (&snapshotter, mode) {
        (Some(s), SaveMode::Sync) => (Some(Arc::clone(s)), None),
        (Some(s), SaveMode::Interval(every)) => (
            None,
            Some(schedule::spawn_interval_saver(Arc::clone(s), every, shutdown.clone())),
        ),
        (None, _) => (None, None),
    };

    let backend = store.backend();
    let app = router::build_router(AppState::new(store), sync_saver);
    let listener = tokio::net::TcpListener::bind(&cfg.address)
        .await
        .map_err(|e| MetricsError::Config(format!("bind {} failed: {e}", cfg.address)))?;

    tracing::info!(address = %cfg.address, backend, ?mode, snapshots = snapshotter.is_some(), "metricsd-server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|e| MetricsError::Internal(format!("server failed: {e}")))?;

    shutdown.cancel();
    if let Some(task) = interval_saver {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "interval saver ended abnormally");
        }
    }

    if let Some(s) = &snapshotter {
        match tokio::time::timeout(cfg.shutdown_timeout(), s.save()).await {
            Ok(Ok(n)) => tracing::info!(metrics = n, path = %s.path().display(), "final snapshot saved"),
            Ok(Err(e)) => tracing::error!(error = %e, "final snapshot failed"),
            Err(_) => tracing::warn!(timeout_ms = cfg.shutdown_timeout_ms, "final snapshot timed out"),
        }
    }
    store_cancel.cancel();

    tracing::info!("metricsd-server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
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
        _ = shutdown.cancelled() => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
