//! Delivery client.
//!
//! Every request runs under the shared retry policy. Status classification:
//! 2xx is delivered; 408, 429 and 5xx are worth retrying; any other status is
//! a client-side mistake and fails at once. Transport errors (refused,
//! reset, timeout) are retried.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tokio_util::sync::CancellationToken;

use metricsd_core::retry::retry;
use metricsd_core::{Metric, MetricRecord, MetricValue, MetricsError, Result, RetryPolicy};

use crate::config::ReportMode;

/// Outcome of one report cycle.
///
/// Metrics go out in order, so the first `delivered` entries of the input
/// reached the server even when `error` is set.
#[derive(Debug)]
pub struct SendReport {
    pub delivered: usize,
    pub error: Option<MetricsError>,
}

impl SendReport {
    fn ok(delivered: usize) -> Self {
        Self { delivered, error: None }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Sender {
    client: Client,
    base: Url,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Sender {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| MetricsError::Config(format!("invalid server url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(MetricsError::Config(format!("server url {base_url:?} cannot carry a path")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetricsError::Config(format!("http client: {e}")))?;
        Ok(Self { client, base, retry, cancel })
    }

    /// `base` + path segments, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MetricsError::Config(format!("server url {} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn send_gauge(&self, name: &str, value: f64) -> Result<()> {
        let url = self.url(&["update", "gauge", name, &value.to_string()])?;
        self.post("send gauge", || self.client.post(url.clone()).header(CONTENT_TYPE, "text/plain"))
            .await
    }

    pub async fn send_counter(&self, name: &str, delta: i64) -> Result<()> {
        let url = self.url(&["update", "counter", name, &delta.to_string()])?;
        self.post("send counter", || self.client.post(url.clone()).header(CONTENT_TYPE, "text/plain"))
            .await
    }

    /// Single JSON record to `/update/`.
    pub async fn send_metric_json(&self, metric: &Metric) -> Result<()> {
        let url = self.url(&["update", ""])?;
        let record = MetricRecord::from(metric.clone());
        self.post("send metric", || self.client.post(url.clone()).json(&record)).await
    }

    /// All metrics as one JSON array to `/updates/`. Empty input sends nothing.
    pub async fn send_batch(&self, metrics: &[Metric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }
        let url = self.url(&["updates", ""])?;
        let records: Vec<MetricRecord> = metrics.iter().cloned().map(MetricRecord::from).collect();
        self.post("send batch", || self.client.post(url.clone()).json(&records)).await
    }

    /// Deliver one report cycle in `mode`. Per-metric modes stop at the first
    /// metric that could not be delivered.
    pub async fn send_all(&self, metrics: &[Metric], mode: ReportMode) -> SendReport {
        if metrics.is_empty() {
            return SendReport::ok(0);
        }

        if mode == ReportMode::Batch {
            return match self.send_batch(metrics).await {
                Ok(()) => SendReport::ok(metrics.len()),
                Err(e) => SendReport { delivered: 0, error: Some(e) },
            };
        }

        for (i, m) in metrics.iter().enumerate() {
            let res = match (mode, m.value) {
                (ReportMode::Json, _) => self.send_metric_json(m).await,
                (_, MetricValue::Gauge(v)) => self.send_gauge(&m.name, v).await,
                (_, MetricValue::Counter(d)) => self.send_counter(&m.name, d).await,
            };
            if let Err(e) = res {
                tracing::warn!(metric = %m.name, kind = %m.kind(), error = %e, "metric not delivered");
                return SendReport { delivered: i, error: Some(e) };
            }
        }
        SendReport::ok(metrics.len())
    }

    async fn post<F>(&self, op_name: &str, build: F) -> Result<()>
    where
        F: Fn() -> RequestBuilder,
    {
        retry(&self.retry, &self.cancel, op_name, |_| {
            let req = build();
            async move {
                let resp = req.send().await.map_err(transport_error)?;
                classify_status(resp.status())
            }
        })
        .await
    }
}

fn transport_error(e: reqwest::Error) -> MetricsError {
    // A request that cannot be built will not build next time either.
    MetricsError::Delivery { retriable: !e.is_builder(), message: e.to_string() }
}

fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let retriable = status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS;
    Err(MetricsError::Delivery { retriable, message: format!("server returned {status}") })
}
