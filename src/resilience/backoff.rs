//! Exponential backoff for tool-handler retries.

use super::cancel::CancellationBridge;
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ExponentialBackoff {
    /// `base * 2^attempt`, capped at `max_delay`. `attempt` is 0-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }

    /// Run `operation` with backoff between failures. Cancellation is never retried.
    pub async fn retry<T, F, Fut>(&self, cancel: &CancellationBridge, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match cancel.run(operation(attempt)).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_cancelled() || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying with backoff");
                    cancel.sleep(delay).await?;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let b = ExponentialBackoff::default();
        assert_eq!(b.delay_for(0), Duration::from_millis(500));
        assert_eq!(b.delay_for(1), Duration::from_millis(1000));
        assert_eq!(b.delay_for(3), Duration::from_millis(4000));
        assert_eq!(b.delay_for(4), Duration::from_secs(5));
        assert_eq!(b.delay_for(63), Duration::from_secs(5));
        assert_eq!(b.delay_for(200), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retries_up_to_limit() {
        let b = ExponentialBackoff {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let res: Result<()> = b
            .retry(&CancellationBridge::default(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::runtime("flaky")) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
