//! Durable store on SQLite (`tokio-rusqlite`).
//!
//! One row per `(id, mtype)`. Gauge writes clear `delta`, counter writes clear
//! `value`, so a row never carries the other kind's payload. Every operation
//! runs through the shared retry policy: busy/locked/I/O faults are retried,
//! anything else (bad SQL, constraint violations, closed connection) aborts at
//! once. `apply_batch` is a single transaction; a failed attempt rolls back
//! before the next one starts.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, ErrorCode, OptionalExtension, TransactionBehavior};
use tokio_rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use metricsd_core::retry::retry;
use metricsd_core::{Metric, MetricValue, MetricsError, Result, RetryPolicy};

use super::{MetricStore, MetricsSnapshot};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS metrics (
        id TEXT NOT NULL,
        mtype TEXT NOT NULL CHECK (mtype IN ('gauge', 'counter')),
        value REAL,
        delta INTEGER,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (id, mtype)
    );";

const UPSERT_GAUGE: &str = "INSERT INTO metrics (id, mtype, value, delta)
    VALUES (?1, 'gauge', ?2, NULL)
    ON CONFLICT (id, mtype) DO UPDATE SET
        value = excluded.value,
        delta = NULL,
        updated_at = CURRENT_TIMESTAMP";

const SELECT_COUNTER: &str =
    "SELECT delta FROM metrics WHERE id = ?1 AND mtype = 'counter' AND delta IS NOT NULL";

const SET_COUNTER: &str = "INSERT INTO metrics (id, mtype, value, delta)
    VALUES (?1, 'counter', NULL, ?2)
    ON CONFLICT (id, mtype) DO UPDATE SET
        delta = excluded.delta,
        value = NULL,
        updated_at = CURRENT_TIMESTAMP";

pub struct SqliteStore {
    conn: Connection,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SqliteStore {
    /// Open (or create) the database and make sure the table exists.
    ///
    /// `dsn` is a file path, optionally prefixed with `sqlite://`.
    pub async fn open(dsn: &str, retry: RetryPolicy, cancel: CancellationToken) -> Result<Self> {
        let path = dsn.strip_prefix("sqlite://").unwrap_or(dsn).to_string();
        let conn = Connection::open(path).await.map_err(classify)?;
        let store = Self { conn, retry, cancel };
        store.run("init schema", |c| c.execute_batch(SCHEMA)).await?;
        Ok(store)
    }

    /// Run `f` on the connection thread under the retry policy.
    async fn run<T, F>(&self, op_name: &'static str, f: F) -> Result<T>
    where
        F: Fn(&mut rusqlite::Connection) -> rusqlite::Result<T> + Clone + Send + Sync + 'static,
        T: Send + 'static,
    {
        retry(&self.retry, &self.cancel, op_name, |_| {
            let conn = self.conn.clone();
            let f = f.clone();
            async move {
                conn.call(move |c| f(c).map_err(tokio_rusqlite::Error::from))
                    .await
                    .map_err(classify)
            }
        })
        .await
    }
}

/// Split backend errors into retriable and fatal faults.
fn classify(err: tokio_rusqlite::Error) -> MetricsError {
    match err {
        tokio_rusqlite::Error::Rusqlite(e) => classify_sqlite(&e),
        tokio_rusqlite::Error::ConnectionClosed => MetricsError::fatal_storage("connection closed"),
        other => MetricsError::fatal_storage(other.to_string()),
    }
}

fn classify_sqlite(e: &rusqlite::Error) -> MetricsError {
    match e.sqlite_error_code() {
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen
            | ErrorCode::OperationInterrupted,
        ) => MetricsError::retriable_storage(e.to_string()),
        _ => MetricsError::fatal_storage(e.to_string()),
    }
}

/// Read-add-write so the sum saturates like the in-memory store. SQLite would
/// silently turn an overflowing integer sum into REAL.
fn add_to_counter(c: &rusqlite::Connection, name: &str, delta: i64) -> rusqlite::Result<()> {
    let current: Option<i64> = c
        .prepare_cached(SELECT_COUNTER)?
        .query_row(params![name], |r| r.get(0))
        .optional()?;
    let total = current.unwrap_or(0).saturating_add(delta);
    c.prepare_cached(SET_COUNTER)?.execute(params![name, total])?;
    Ok(())
}

#[async_trait]
impl MetricStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert_gauge(&self, name: &str, value: f64) -> Result<()> {
        let name = name.to_string();
        self.run("upsert gauge", move |c| c.execute(UPSERT_GAUGE, params![name, value]).map(|_| ()))
            .await
    }

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<()> {
        let name = name.to_string();
        self.run("increment counter", move |c| {
            let tx = c.transaction_with_behavior(TransactionBehavior::Immediate)?;
            add_to_counter(&tx, &name, delta)?;
            tx.commit()
        })
        .await
    }

    async fn set_counter(&self, name: &str, value: i64) -> Result<()> {
        let name = name.to_string();
        self.run("set counter", move |c| c.execute(SET_COUNTER, params![name, value]).map(|_| ()))
            .await
    }

    async fn apply_batch(&self, batch: &[Metric]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let batch: Arc<Vec<Metric>> = Arc::new(batch.to_vec());
        self.run("apply batch", move |c| {
            let tx = c.transaction_with_behavior(TransactionBehavior::Immediate)?;
            {
                let mut gauge = tx.prepare_cached(UPSERT_GAUGE)?;
                for m in batch.iter() {
                    match m.value {
                        MetricValue::Gauge(v) => {
                            gauge.execute(params![m.name, v])?;
                        }
                        MetricValue::Counter(d) => add_to_counter(&tx, &m.name, d)?,
                    }
                }
            }
            tx.commit()
        })
        .await
    }

    async fn read_gauge(&self, name: &str) -> Result<Option<f64>> {
        let name = name.to_string();
        self.run("read gauge", move |c| {
            c.query_row(
                "SELECT value FROM metrics WHERE id = ?1 AND mtype = 'gauge' AND value IS NOT NULL",
                params![name],
                |r| r.get(0),
            )
            .optional()
        })
        .await
    }

    async fn read_counter(&self, name: &str) -> Result<Option<i64>> {
        let name = name.to_string();
        self.run("read counter", move |c| {
            c.query_row(SELECT_COUNTER, params![name], |r| r.get(0)).optional()
        })
        .await
    }

    async fn read_all(&self) -> Result<MetricsSnapshot> {
        self.run("read all", |c| {
            let tx = c.transaction()?;
            let mut snap = MetricsSnapshot::default();
            {
                let mut stmt = tx.prepare(
                    "SELECT id, value FROM metrics WHERE mtype = 'gauge' AND value IS NOT NULL",
                )?;
                let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))?;
                for row in rows {
                    let (id, value) = row?;
                    snap.gauges.insert(id, value);
                }

                let mut stmt = tx.prepare(
                    "SELECT id, delta FROM metrics WHERE mtype = 'counter' AND delta IS NOT NULL",
                )?;
                let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
                for row in rows {
                    let (id, delta) = row?;
                    snap.counters.insert(id, delta);
                }
            }
            tx.commit()?;
            Ok(snap)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.run("ping", |c| c.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).map(|_| ()))
            .await
    }
}
