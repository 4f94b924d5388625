//! Bounded retry with linear backoff.
//!
//! Shared by the durable store and the delivery client. Attempt `n` (0-based)
//! that fails with a retriable error is followed by a sleep of
//! `initial_delay + n * delay_step`. Both the attempt and the sleep race the
//! caller's [`CancellationToken`], so shutdown aborts promptly with
//! [`MetricsError::Cancelled`] instead of running the remaining attempts.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{MetricsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub delay_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            delay_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, delay_step: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_delay, delay_step }
    }

    /// No backoff, single attempt.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Sleep after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_add(self.delay_step.saturating_mul(attempt))
    }
}

/// Config-file shape of a [`RetryPolicy`] (milliseconds).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_delay_step_ms")]
    pub delay_step_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            delay_step_ms: default_delay_step_ms(),
        }
    }
}

impl RetrySection {
    pub fn validate(&self, section: &str) -> Result<()> {
        if !(1..=10).contains(&self.max_attempts) {
            return Err(MetricsError::Config(format!(
                "{section}.max_attempts must be between 1 and 10"
            )));
        }
        if self.initial_delay_ms > 60_000 || self.delay_step_ms > 60_000 {
            return Err(MetricsError::Config(format!(
                "{section} delays must not exceed 60000 ms"
            )));
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.delay_step_ms),
        )
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_delay_step_ms() -> u64 {
    2000
}

/// Run `op` under `policy`.
///
/// `op` receives the 0-based attempt index. Non-retriable errors are returned
/// unchanged on the spot; after the last retriable failure the error is wrapped
/// in [`MetricsError::RetriesExhausted`].
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op_name: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MetricsError::Cancelled),
            res = op(attempt) => res,
        };

        let err = match res {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retriable() => return Err(e),
            Err(e) => e,
        };

        if attempt + 1 >= attempts {
            tracing::warn!(op = op_name, attempts, error = %err, "retries exhausted");
            return Err(MetricsError::RetriesExhausted { attempts, source: Box::new(err) });
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(op = op_name, attempt = attempt + 1, ?delay, error = %err, "attempt failed, retrying");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MetricsError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
