//! # ai-lib-gateway
//!
//! 多厂商大模型对话路由：自动降级、密钥轮换与流式工具调用。
//!
//! Chat-completion gateway that routes requests across language-model providers, with
//! automatic fallback across providers and models, per-key rotation and daily limits,
//! and an embedded tool-call protocol that works on streamed output.
//!
//! ## Overview
//!
//! Provider wire formats stay behind the [`provider::ProviderAdapter`] trait. The gateway
//! decides *which* adapter, model and credential to use, retries and rotates on
//! classified failures, and runs the multi-turn tool loop on top.
//!
//! - **Direct dispatch**: provider + model given; rotate through that provider's keys
//! - **Auto mode**: no provider given; try active provider/model candidates by priority
//! - **Tool loop**: detect `[tool]...[/tool]` blocks, run the caller's handler, feed results back
//! - **Cancellation**: a [`tokio_util::sync::CancellationToken`] interrupts every suspension point
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_gateway::keys::{ApiKeyRecord, InMemoryKeyStore};
//! use ai_lib_gateway::provider::{ChatSink, ProviderAdapter, ProviderRequest};
//! use ai_lib_gateway::{ChatRequest, ChatResponse, Gateway, Message, StaticCatalog};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ProviderAdapter for Echo {
//!     async fn chat_completion(
//!         &self,
//!         req: &ProviderRequest,
//!         _key: &ApiKeyRecord,
//!     ) -> ai_lib_gateway::Result<ChatResponse> {
//!         let last = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
//!         Ok(ChatResponse::text(last))
//!     }
//!
//!     async fn stream_chat_completion(
//!         &self,
//!         _req: &ProviderRequest,
//!         _key: &ApiKeyRecord,
//!         sink: &dyn ChatSink,
//!     ) -> ai_lib_gateway::Result<()> {
//!         sink.write("hello");
//!         sink.end();
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_gateway::Result<()> {
//!     let gateway = Gateway::builder()
//!         .with_adapter("echo", Arc::new(Echo))
//!         .catalog(Arc::new(StaticCatalog::new().provider("echo", 10).model("echo", "echo-1", 10)))
//!         .key_store(Arc::new(
//!             InMemoryKeyStore::new().with_key(ApiKeyRecord::new("k1", "echo", "secret", 10)),
//!         ))
//!         .build()?;
//!
//!     let response = gateway.chat(ChatRequest::new(vec![Message::user("Hi")])).await?;
//!     println!("{}", response.content());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Gateway`], its builder, and error classification |
//! | [`dispatch`] | Direct and auto-fallback dispatchers, request routing |
//! | [`orchestrator`] | Streaming and non-streaming tool loops |
//! | [`tools`] | Tool-call parser, prompt/result formatting, validation, handlers |
//! | [`keys`] | API key records, selection and the key store boundary |
//! | [`catalog`] | Provider/model candidates for auto mode |
//! | [`provider`] | Adapter trait, sinks and the provider registry |
//! | [`resilience`] | Retry executor, exponential backoff, cancellation bridge |
//! | [`config`] | YAML configuration with environment overrides |
//! | [`transport`] | SSE framing of streamed events |
//! | [`types`] | Messages, requests, responses, tools and stream events |

pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error_code;
pub mod keys;
pub mod orchestrator;
pub mod provider;
pub mod resilience;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use catalog::{Catalog, StaticCatalog};
pub use client::{classify, ErrorClassification, Gateway, GatewayBuilder};
pub use config::GatewayConfig;
pub use dispatch::ChatDispatch;
pub use error_code::ErrorCategory;
pub use tools::{FnToolHandler, ToolHandler, ToolStreamParser};
pub use transport::sse_stream;
pub use types::{
    events::StreamEvent,
    message::{Message, MessageRole},
    request::ChatRequest,
    response::{AutoFallbackInfo, ChatResponse},
    tool::{ToolCall, ToolDefinition, ToolParameter},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
