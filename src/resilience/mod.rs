//! Resilience primitives: fixed-delay retry, exponential backoff and cancellation.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | [`RetryExecutor`] wrapping each provider call with a fixed delay |
//! | [`backoff`] | [`ExponentialBackoff`] for tool-handler retries (capped at 5s) |
//! | [`cancel`] | [`CancellationBridge`] and [`ControlledStream`] for cooperative cancellation |
//!
//! Every suspension point (provider call, tool call, retry delay) goes through the
//! bridge, so a fired [`tokio_util::sync::CancellationToken`] interrupts it.

pub mod backoff;
pub mod cancel;
pub mod retry;

pub use backoff::ExponentialBackoff;
pub use cancel::{AbortOnDrop, CancellationBridge, ControlledStream};
pub use retry::{RetryExecutor, RetryOptions};
