//! Caller-supplied tool execution.

use crate::resilience::{CancellationBridge, ExponentialBackoff};
use crate::types::ToolCall;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Executes tool calls for one request.
///
/// An `Err` is a tool failure: it is reported back to the model as a tool-result message
/// and never aborts the request.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, call: &ToolCall) -> Result<Value>;
}

/// [`ToolHandler`] backed by an async closure.
pub struct FnToolHandler<F> {
    f: F,
}

impl<F, Fut> FnToolHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, call: &ToolCall) -> Result<Value> {
        (self.f)(call.clone()).await
    }
}

/// Run `handler` for `call` with exponential backoff between failed attempts.
pub async fn execute_with_backoff(
    handler: &dyn ToolHandler,
    call: &ToolCall,
    backoff: &ExponentialBackoff,
    cancel: &CancellationBridge,
) -> Result<Value> {
    debug!(tool = call.name.as_str(), call_id = call.id.as_str(), "executing tool");
    let result = backoff.retry(cancel, |_| handler.call(call)).await;
    if let Err(e) = &result {
        if !e.is_cancelled() {
            warn!(tool = call.name.as_str(), error = %e, "tool failed after retries");
        }
    }
    result
}
