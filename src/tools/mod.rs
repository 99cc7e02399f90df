//! Embedded tool-call protocol.
//!
//! The model calls a tool by writing a `[tool]{"name": ..., "params": {...}}[/tool]` block.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`parser`] | [`ToolStreamParser`] detecting calls in chunked output |
//! | [`format`] | Tool prompt and tool-result messages |
//! | [`validate`] | Resolve a call against its [`ToolDefinition`](crate::types::ToolDefinition) |
//! | [`handler`] | [`ToolHandler`] trait and backoff execution |

pub mod format;
pub mod handler;
pub mod parser;
pub mod validate;

pub use format::{build_tool_prompt, format_tool_error, format_tool_result, neutralize_tags};
pub use handler::{execute_with_backoff, FnToolHandler, ToolHandler};
pub use parser::{scan_content, ContentScan, ParserEvent, ToolStreamParser, TOOL_CLOSE, TOOL_OPEN};
pub use validate::validate_call;
