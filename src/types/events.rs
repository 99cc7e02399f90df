//! Streaming events delivered to the caller, in strict chronological order.

use crate::types::tool::ToolCall;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum StreamEvent {
    /// Visible text produced by the model.
    TextDelta { content: String },

    /// The model started writing a tool call; its arguments are not complete yet.
    ToolPending,

    /// A tool call was detected and is being executed.
    ToolExecuting { call: ToolCall },

    /// Tool executed successfully.
    ToolResult { call: ToolCall, result: Value },

    /// Tool call could not be parsed, validated or executed.
    ToolError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call: Option<ToolCall>,
        error: String,
    },

    /// Clean end of the response.
    Finished { finish_reason: String },
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            content: content.into(),
        }
    }

    /// Render the OpenAI-compatible JSON payload of an SSE frame.
    pub fn to_json(&self) -> Value {
        match self {
            StreamEvent::TextDelta { content } => json!({
                "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
            }),
            StreamEvent::ToolPending => json!({"tool_call": {"type": "pending"}}),
            StreamEvent::ToolExecuting { call } => {
                json!({"tool_call": {"type": "executing", "call": call}})
            }
            StreamEvent::ToolResult { call, result } => {
                json!({"tool_call": {"type": "success", "call": call, "result": result}})
            }
            StreamEvent::ToolError { call, error } => {
                let mut status = json!({"type": "error", "error": error});
                if let Some(call) = call {
                    status["call"] = json!(call);
                }
                json!({ "tool_call": status })
            }
            StreamEvent::Finished { finish_reason } => json!({
                "choices": [{"index": 0, "delta": {}, "finish_reason": finish_reason}]
            }),
        }
    }

    /// `data: <json>\n\n`
    pub fn to_sse_frame(&self) -> Bytes {
        Bytes::from(format!("data: {}\n\n", self.to_json()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_shape() {
        let frame = StreamEvent::text("Hi").to_sse_frame();
        let s = std::str::from_utf8(&frame).unwrap();
        assert!(s.starts_with("data: "));
        assert!(s.ends_with("\n\n"));
        let v: Value = serde_json::from_str(s.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(v["choices"][0]["delta"]["content"], "Hi");
        assert!(v["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn tool_status_frames() {
        assert_eq!(
            StreamEvent::ToolPending.to_json(),
            json!({"tool_call": {"type": "pending"}})
        );
        let err = StreamEvent::ToolError {
            call: None,
            error: "bad json".into(),
        };
        assert_eq!(err.to_json()["tool_call"]["type"], "error");
        assert!(err.to_json()["tool_call"].get("call").is_none());
    }
}
