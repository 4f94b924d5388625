//! Sender behavior against a local recording server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, http::Uri, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use metricsd_agent::runner::report_once;
use metricsd_agent::{Collector, ReportMode, Sender};
use metricsd_core::{Metric, MetricsError, RetryPolicy};

type Responder = Arc<dyn Fn(usize, &str) -> StatusCode + Send + Sync>;

#[derive(Clone)]
struct Recorder {
    hits: Arc<Mutex<Vec<(String, String)>>>,
    respond: Responder,
}

impl Recorder {
    fn hits(&self) -> Vec<(String, String)> {
        self.hits.lock().unwrap().clone()
    }

    fn paths(&self) -> Vec<String> {
        self.hits().into_iter().map(|(p, _)| p).collect()
    }
}

async fn record(State(rec): State<Recorder>, uri: Uri, body: String) -> StatusCode {
    let path = uri.path().to_string();
    let n = {
        let mut hits = rec.hits.lock().unwrap();
        hits.push((path.clone(), body));
        hits.len() - 1
    };
    (rec.respond)(n, &path)
}

/// Start a server answering with `respond(request_index, path)`.
async fn serve(respond: impl Fn(usize, &str) -> StatusCode + Send + Sync + 'static) -> (String, Recorder) {
    let rec = Recorder { hits: Arc::default(), respond: Arc::new(respond) };
    let app = Router::new().fallback(record).with_state(rec.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), rec)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(5))
}

fn sender(base: &str) -> Sender {
    Sender::new(base, Duration::from_secs(2), fast_retry(), CancellationToken::new()).unwrap()
}

fn sample() -> Vec<Metric> {
    vec![Metric::gauge("Alloc", 1024.0), Metric::gauge("RandomValue", 0.5), Metric::counter("PollCount", 2)]
}

#[tokio::test]
async fn batch_mode_sends_one_array() {
    let (base, rec) = serve(|_, _| StatusCode::OK).await;
    let report = sender(&base).send_all(&sample(), ReportMode::Batch).await;

    assert!(report.is_ok());
    assert_eq!(report.delivered, 3);
    let hits = rec.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "/updates/");
    let body: Value = serde_json::from_str(&hits[0].1).unwrap();
    assert_eq!(
        body,
        json!([
            {"id": "Alloc", "type": "gauge", "value": 1024.0},
            {"id": "RandomValue", "type": "gauge", "value": 0.5},
            {"id": "PollCount", "type": "counter", "delta": 2}
        ])
    );
}

#[tokio::test]
async fn per_metric_mode_uses_plaintext_paths() {
    let (base, rec) = serve(|_, _| StatusCode::OK).await;
    let report = sender(&base).send_all(&sample(), ReportMode::PerMetric).await;

    assert!(report.is_ok());
    assert_eq!(
        rec.paths(),
        ["/update/gauge/Alloc/1024", "/update/gauge/RandomValue/0.5", "/update/counter/PollCount/2"]
    );
}

#[tokio::test]
async fn json_mode_posts_single_records() {
    let (base, rec) = serve(|_, _| StatusCode::OK).await;
    let report = sender(&base).send_all(&sample()[2..], ReportMode::Json).await;

    assert!(report.is_ok());
    let hits = rec.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "/update/");
    let body: Value = serde_json::from_str(&hits[0].1).unwrap();
    assert_eq!(body, json!({"id": "PollCount", "type": "counter", "delta": 2}));
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let (base, rec) = serve(|n, _| if n < 2 { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK }).await;
    sender(&base).send_batch(&sample()).await.unwrap();
    assert_eq!(rec.hits().len(), 3);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_policy() {
    let (base, rec) = serve(|_, _| StatusCode::INTERNAL_SERVER_ERROR).await;
    let err = sender(&base).send_gauge("Alloc", 1.0).await.unwrap_err();

    match err {
        MetricsError::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(source.to_string().contains("500"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(rec.hits().len(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (base, rec) = serve(|_, _| StatusCode::BAD_REQUEST).await;
    let err = sender(&base).send_counter("PollCount", 1).await.unwrap_err();

    assert!(matches!(err, MetricsError::Delivery { retriable: false, .. }));
    assert_eq!(rec.hits().len(), 1);
}

#[tokio::test]
async fn refused_connection_is_retried_then_reported() {
    // grab a free port, then close it
    let addr = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let err = sender(&format!("http://{addr}")).send_batch(&sample()).await.unwrap_err();
    assert!(matches!(err, MetricsError::RetriesExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn per_metric_mode_stops_at_first_failure() {
    let (base, rec) = serve(|_, path| {
        if path.contains("RandomValue") { StatusCode::BAD_REQUEST } else { StatusCode::OK }
    })
    .await;
    let report = sender(&base).send_all(&sample(), ReportMode::PerMetric).await;

    assert_eq!(report.delivered, 1);
    assert!(matches!(report.error, Some(MetricsError::Delivery { retriable: false, .. })));
    assert_eq!(rec.hits().len(), 2);
}

#[tokio::test]
async fn empty_report_sends_nothing() {
    let (base, rec) = serve(|_, _| StatusCode::OK).await;
    let s = sender(&base);
    assert_eq!(s.send_all(&[], ReportMode::Batch).await.delivered, 0);
    s.send_batch(&[]).await.unwrap();
    assert!(rec.hits().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let (base, rec) = serve(|_, _| StatusCode::BAD_GATEWAY).await;
    let cancel = CancellationToken::new();
    let slow = RetryPolicy::new(5, Duration::from_secs(30), Duration::ZERO);
    let s = Sender::new(&base, Duration::from_secs(2), slow, cancel.clone()).unwrap();

    let task = tokio::spawn(async move { s.send_gauge("g", 1.0).await });
    while rec.hits().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let res = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(matches!(res, Err(MetricsError::Cancelled)));
    assert_eq!(rec.hits().len(), 1);
}

#[tokio::test]
async fn report_acknowledges_only_delivered_counters() {
    let collector = Collector::new();
    collector.add_counter("PollCount", 4).unwrap();
    collector.set_gauge("Alloc", 1.0).unwrap();

    let (down, _) = serve(|_, _| StatusCode::BAD_REQUEST).await;
    let report = report_once(&collector, &sender(&down), ReportMode::Batch).await;
    assert!(!report.is_ok());
    assert!(collector.snapshot().unwrap().contains(&Metric::counter("PollCount", 4)));

    let (up, _) = serve(|_, _| StatusCode::OK).await;
    let report = report_once(&collector, &sender(&up), ReportMode::Batch).await;
    assert!(report.is_ok());
    assert!(collector.snapshot().unwrap().contains(&Metric::counter("PollCount", 0)));
}
