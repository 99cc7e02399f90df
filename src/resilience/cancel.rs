//! Cancellation bridge: propagates an external [`CancellationToken`] into in-flight work.
//!
//! The "listener" is the token's `cancelled()` future. It lives exactly as long as the
//! guarded future or stream, so it is released on every exit path (success, error, drop)
//! and sequential requests sharing one token never accumulate listeners.

use crate::{BoxStream, Error, Result};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type CancelFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Default)]
pub struct CancellationBridge {
    token: Option<CancellationToken>,
}

impl CancellationBridge {
    pub fn new(token: Option<CancellationToken>) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Fail fast when the signal already fired. Call before any network work.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Run `fut`, resolving to [`Error::Cancelled`] as soon as the signal fires.
    /// The future is dropped on cancellation, which tears down its transport.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        match &self.token {
            None => fut.await,
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    res = fut => res,
                }
            }
        }
    }

    /// Interruptible sleep used for retry and backoff delays.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.check();
        }
        self.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    /// Wrap a stream so that it yields a single [`Error::Cancelled`] item and ends once the
    /// signal fires. Nothing from `inner` is forwarded afterwards.
    pub fn guard_stream<T: Send + 'static>(
        &self,
        inner: BoxStream<'static, T>,
    ) -> BoxStream<'static, T> {
        Box::pin(ControlledStream::new(inner, self.token.clone(), None))
    }
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub struct AbortOnDrop(JoinHandle<()>);

impl AbortOnDrop {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Stream wrapper combining a cancellation signal with an optional producer task that is
/// aborted when the consumer drops the stream.
pub struct ControlledStream<T> {
    inner: Option<BoxStream<'static, T>>,
    cancelled: Option<CancelFuture>,
    done: bool,
    _producer: Option<AbortOnDrop>,
}

impl<T> ControlledStream<T> {
    pub fn new(
        inner: BoxStream<'static, T>,
        token: Option<CancellationToken>,
        producer: Option<AbortOnDrop>,
    ) -> Self {
        let cancelled = token.map(|t| -> CancelFuture { Box::pin(async move { t.cancelled().await }) });
        Self {
            inner: Some(inner),
            cancelled,
            done: false,
            _producer: producer,
        }
    }
}

impl<T> Stream for ControlledStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if let Some(fut) = this.cancelled.as_mut() {
            if fut.as_mut().poll(cx).is_ready() {
                this.done = true;
                this.cancelled = None;
                this.inner = None;
                this._producer = None;
                return Poll::Ready(Some(Err(Error::Cancelled)));
            }
        }

        let Some(inner) = this.inner.as_mut() else {
            this.done = true;
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                // A signal firing after the final item has no effect.
                this.done = true;
                this.cancelled = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
