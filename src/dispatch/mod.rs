//! Dispatch layer.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DirectDispatcher`] | One provider+model across its keys, with retry and rotation |
//! | [`AutoFallbackDispatcher`] | Provider/model candidates by priority, absorbing retryable failures |
//! | [`Router`] | Resolves the request's hints to one of the above |
//!
//! ```text
//! ChatRequest ──► Router ──► provider+model given? ──► DirectDispatcher ──► keys × RetryExecutor
//!                        └─► otherwise ─────────────► AutoFallbackDispatcher ──► DirectDispatcher …
//! ```

pub mod auto;
pub mod direct;
pub mod router;

pub use auto::AutoFallbackDispatcher;
pub use direct::DirectDispatcher;
pub use router::{Route, Router};

use crate::types::{ChatRequest, ChatResponse};
use crate::{BoxStream, Result};
use async_trait::async_trait;

/// Stream of visible text chunks from a provider.
pub type TextStream = BoxStream<'static, String>;

/// Seam between the tool orchestrator and whatever dispatches model turns.
#[async_trait]
pub trait ChatDispatch: Send + Sync {
    async fn dispatch(&self, request: &ChatRequest) -> Result<ChatResponse>;
    async fn dispatch_stream(&self, request: &ChatRequest) -> Result<TextStream>;
}
