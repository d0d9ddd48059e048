//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::SwitchboardError;

/// Retry policy for transient completion-service failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Execute `operation`, retrying only errors that report
    /// [`SwitchboardError::is_retryable`]. A rate-limit `retry_after` hint
    /// replaces the computed backoff for that attempt.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, SwitchboardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwitchboardError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            let wait = match err {
                SwitchboardError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(ms).min(self.max_backoff),
                _ => jittered(backoff),
            };
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "retrying completion call"
            );
            tokio::time::sleep(wait).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }
}

/// 75%–125% of `base`.
fn jittered(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let factor = 0.75 + (nanos % 10_000) as f64 / 20_000.0;
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}
