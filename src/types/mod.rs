//! Core data types: messages, requests, responses, tools and streaming events.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`ChatRequest`] | Caller request with optional provider/model hints and tools |
//! | [`ChatResponse`] | Non-streaming response, with `auto_fallback` metadata when applicable |
//! | [`StreamEvent`] | Ordered streaming event (text, tool status, terminal) |
//! | [`ToolDefinition`] / [`ToolCall`] | Tool declarations and parsed calls |
//!
//! ```rust
//! use ai_lib_gateway::types::{ChatRequest, Message, ToolDefinition, ToolParameter};
//!
//! let request = ChatRequest::new(vec![Message::user("What's the weather in Oslo?")])
//!     .tools(vec![ToolDefinition::new("get_weather", "Current weather for a city")
//!         .param("city", ToolParameter::new("string", "City name").required())]);
//! assert_eq!(request.max_tool_iterations, 5);
//! ```

pub mod events;
pub mod message;
pub mod request;
pub mod response;
pub mod tool;

pub use events::StreamEvent;
pub use message::{Message, MessageRole};
pub use request::ChatRequest;
pub use response::{AutoFallbackInfo, ChatResponse, Choice, Usage};
pub use tool::{ToolCall, ToolDefinition, ToolParameter};
