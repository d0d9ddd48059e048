//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::SwitchboardError;

/// Fail with [`SwitchboardError::Timeout`] if `future` outlives `duration`.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, SwitchboardError>>,
) -> Result<T, SwitchboardError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(SwitchboardError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let err = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SwitchboardError::Timeout(50)));
    }
}
