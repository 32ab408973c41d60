//! Backoff for commands the gateway reported busy

use std::time::Duration;

use meshuart_shared::timing;
use tracing::warn;

use crate::error::{Result, UartError};

/// How a busy gateway is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyRetry {
    /// Delay before the command is sent again
    pub backoff: Duration,
    /// Retries allowed after the first attempt; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for BusyRetry {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(timing::BUSY_BACKOFF_MS),
            max_retries: None,
        }
    }
}

impl BusyRetry {
    /// Called after attempt number `attempts` (1-based) came back busy.
    ///
    /// Sleeps for the backoff, or fails once the retry budget is spent.
    pub async fn backoff(&self, attempts: u32) -> Result<()> {
        if let Some(max) = self.max_retries {
            if attempts > max {
                warn!("Gateway busy, giving up after {} attempts", attempts);
                return Err(UartError::BusyRetriesExhausted { attempts });
            }
        }
        warn!("Gateway busy (attempt {}), retrying in {:?}", attempts, self.backoff);
        tokio::time::sleep(self.backoff).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_by_default() {
        let retry = BusyRetry::default();
        let started = Instant::now();
        for attempts in 1..=50 {
            retry.backoff(attempts).await.expect("should keep retrying");
        }
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_is_enforced() {
        let retry = BusyRetry {
            max_retries: Some(2),
            ..Default::default()
        };
        assert!(retry.backoff(1).await.is_ok());
        assert!(retry.backoff(2).await.is_ok());
        assert!(matches!(
            retry.backoff(3).await,
            Err(UartError::BusyRetriesExhausted { attempts: 3 })
        ));
    }
}
