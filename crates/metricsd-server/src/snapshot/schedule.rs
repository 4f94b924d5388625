//! Save triggers: after every update (sync mode) or on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Snapshotter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Save after each successful update request.
    Sync,
    /// Save on a timer.
    Interval(Duration),
}

impl SaveMode {
    pub fn from_secs(store_interval: u64) -> Self {
        if store_interval == 0 {
            SaveMode::Sync
        } else {
            SaveMode::Interval(Duration::from_secs(store_interval))
        }
    }
}

/// Save every `every` until `shutdown` fires. The first save happens one full
/// period after start.
pub fn spawn_interval_saver(
    snapshotter: Arc<Snapshotter>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = snapshotter.save().await {
                        tracing::error!(error = %e, "interval snapshot failed");
                    }
                }
            }
        }
        tracing::debug!("interval saver stopped");
    })
}

/// Middleware for sync mode: save after every successful `POST /update…`.
///
/// A failed save is logged and the client still gets the handler's response.
pub async fn save_after_update(
    State(snapshotter): State<Arc<Snapshotter>>,
    req: Request,
    next: Next,
) -> Response {
    let mutating = req.method() == Method::POST && req.uri().path().starts_with("/update");
    let resp = next.run(req).await;

    if mutating && resp.status().is_success() {
        if let Err(e) = snapshotter.save().await {
            tracing::error!(error = %e, path = %snapshotter.path().display(), "sync snapshot failed");
        }
    }
    resp
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::{MemoryStore, MetricStore};

    #[test]
    fn zero_interval_means_sync() {
        assert_eq!(SaveMode::from_secs(0), SaveMode::Sync);
        assert_eq!(SaveMode::from_secs(300), SaveMode::Interval(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn interval_saver_writes_after_one_period_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
        store.upsert_gauge("g", 1.0).await.unwrap();

        let shutdown = CancellationToken::new();
        let snap = Arc::new(Snapshotter::new(&path, true, store));
        let task = spawn_interval_saver(snap, Duration::from_millis(200), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!path.exists());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !path.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(path.exists());

        shutdown.cancel();
        task.await.unwrap();
    }
}
