//! Fixed-delay retry executor used around provider calls.
//!
//! Exponential backoff is a separate policy ([`super::backoff`]) used only for tool handlers.

use super::cancel::CancellationBridge;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total attempts, including the first one. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

pub struct RetryExecutor {
    options: RetryOptions,
    cancel: CancellationBridge,
}

impl RetryExecutor {
    pub fn new(options: RetryOptions, cancel: CancellationBridge) -> Self {
        Self { options, cancel }
    }

    /// Run `operation` until it succeeds or attempts are exhausted, re-raising the last error.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(operation, |_| true).await
    }

    /// Like [`run`](Self::run), but only errors accepted by `should_retry` are retried.
    /// Cancellation always short-circuits without delay.
    pub async fn run_if<T, F, Fut, P>(&self, mut operation: F, should_retry: P) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            self.cancel.check()?;
            match self.cancel.run(operation(attempt)).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts || !should_retry(&e) {
                        return Err(e);
                    }
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = self.options.delay.as_millis() as u64,
                        error = %e,
                        "retrying after failure"
                    );
                    self.cancel.sleep(self.options.delay).await?;
                }
            }
        }
    }
}
