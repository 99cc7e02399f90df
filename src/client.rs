//! Gateway entry point.
//!
//! Keep the public surface small: build a [`Gateway`] once with [`GatewayBuilder`], then call
//! `chat`, `chat_stream`, `chat_with_tools` or `chat_stream_with_tools` per request.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod error_classification;

pub use builder::GatewayBuilder;
pub use core::Gateway;
pub use error_classification::{classify, ErrorClassification};
