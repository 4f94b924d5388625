//! Poll and report loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::collector::Collector;
use crate::config::ReportMode;
use crate::sender::{SendReport, Sender};

/// Snapshot the collector, deliver, and acknowledge whatever reached the
/// server. Undelivered counter deltas stay in the collector for next time.
pub async fn report_once(collector: &Collector, sender: &Sender, mode: ReportMode) -> SendReport {
    let metrics = match collector.snapshot() {
        Ok(m) => m,
        Err(e) => return SendReport { delivered: 0, error: Some(e) },
    };

    let report = sender.send_all(&metrics, mode).await;
    if let Err(e) = collector.acknowledge(&metrics[..report.delivered]) {
        tracing::error!(error = %e, "acknowledge failed");
    }
    report
}

pub fn spawn_poller(collector: Arc<Collector>, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(?every, "polling started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = collector.poll() {
                        tracing::error!(error = %e, "poll failed");
                        continue;
                    }
                    if let Ok((gauges, counters)) = collector.counts() {
                        tracing::debug!(gauges, counters, "metrics collected");
                    }
                }
            }
        }
        tracing::info!("polling stopped");
    })
}

pub fn spawn_reporter(
    collector: Arc<Collector>,
    sender: Arc<Sender>,
    every: Duration,
    mode: ReportMode,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(?every, ?mode, "reporting started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = report_once(&collector, &sender, mode).await;
                    match report.error {
                        None => tracing::info!(delivered = report.delivered, "metrics reported"),
                        Some(e) => tracing::warn!(delivered = report.delivered, error = %e, "report incomplete"),
                    }
                }
            }
        }
        tracing::info!("reporting stopped");
    })
}
