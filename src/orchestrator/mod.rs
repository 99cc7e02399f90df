//! Multi-turn tool loop: dispatch, detect a tool call, execute it, append the result and
//! dispatch again, bounded by the request's `max_tool_iterations`.
//!
//! The non-streaming loop lives here; the streaming one in [`stream`].

mod stream;

use crate::dispatch::ChatDispatch;
use crate::resilience::{CancellationBridge, ExponentialBackoff};
use crate::tools::{
    build_tool_prompt, execute_with_backoff, format_tool_error, format_tool_result, scan_content,
    validate_call, ParserEvent, ToolHandler,
};
use crate::types::{ChatRequest, ChatResponse, Message, StreamEvent, ToolCall, ToolDefinition};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MALFORMED_CALL_HINT: &str =
    "Write the call as [tool]{\"name\": \"<tool>\", \"params\": {...}}[/tool] with valid JSON.";

#[derive(Clone)]
pub struct ToolOrchestrator {
    dispatcher: Arc<dyn ChatDispatch>,
    backoff: ExponentialBackoff,
}

/// A tool block found in model output.
pub(crate) struct Detected {
    /// Tag text exactly as the model wrote it.
    raw: String,
    call: std::result::Result<ToolCall, String>,
}

impl Detected {
    pub(crate) fn from_event(event: ParserEvent) -> Option<Self> {
        match event {
            ParserEvent::ToolCall { call, raw } => Some(Self { raw, call: Ok(call) }),
            ParserEvent::ToolCallError { error, raw } => Some(Self { raw, call: Err(error) }),
            ParserEvent::Text(_) | ParserEvent::ToolPending => None,
        }
    }
}

pub(crate) enum Outcome {
    Success {
        call: ToolCall,
        result: Value,
    },
    Failure {
        call: Option<ToolCall>,
        error: String,
        suggestion: Option<String>,
    },
}

impl Outcome {
    /// User-role message fed back to the model.
    fn message(&self) -> Message {
        match self {
            Outcome::Success { call, result } => Message::user(format_tool_result(&call.name, result)),
            Outcome::Failure {
                call,
                error,
                suggestion,
            } => {
                let name = call.as_ref().map(|c| c.name.as_str()).unwrap_or("tool call");
                Message::user(format_tool_error(name, error, suggestion.as_deref()))
            }
        }
    }

    fn event(&self) -> StreamEvent {
        match self {
            Outcome::Success { call, result } => StreamEvent::ToolResult {
                call: call.clone(),
                result: result.clone(),
            },
            Outcome::Failure { call, error, .. } => StreamEvent::ToolError {
                call: call.clone(),
                error: error.clone(),
            },
        }
    }
}

impl ToolOrchestrator {
    pub fn new(dispatcher: Arc<dyn ChatDispatch>, backoff: ExponentialBackoff) -> Self {
        Self { dispatcher, backoff }
    }

    /// Non-streaming tool loop. Cancellation observed between turns is an error.
    pub async fn run(&self, request: &ChatRequest, handler: Arc<dyn ToolHandler>) -> Result<ChatResponse> {
        let cancel = CancellationBridge::new(request.cancel.clone());
        let mut turn = seed_conversation(request);
        let max_iterations = request.max_tool_iterations;
        let mut iteration = 0;

        while iteration < max_iterations {
            cancel.check()?;
            let response = self.dispatcher.dispatch(&turn).await?;
            let scan = scan_content(response.content());
            let Some(detected) = scan.tool.and_then(Detected::from_event) else {
                debug!(iteration, "no tool call, turn finished");
                return Ok(response);
            };
            iteration += 1;

            let outcome = match resolve(&turn.tools, &detected) {
                Ok(call) => self.invoke(handler.as_ref(), call, &cancel).await?,
                Err(outcome) => outcome,
            };
            append_turn(&mut turn, scan.text, &detected, &outcome);
        }

        cancel.check()?;
        info!(max_iterations, "tool iteration limit reached, making final dispatch");
        self.dispatcher.dispatch(&turn).await
    }

    async fn invoke(
        &self,
        handler: &dyn ToolHandler,
        call: ToolCall,
        cancel: &CancellationBridge,
    ) -> Result<Outcome> {
        match execute_with_backoff(handler, &call, &self.backoff, cancel).await {
            Ok(result) => Ok(Outcome::Success { call, result }),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Ok(Outcome::Failure {
                call: Some(call),
                error: e.to_string(),
                suggestion: None,
            }),
        }
    }
}

/// Copy of `request` whose leading system message carries the tool prompt.
///
/// The request's own system prompt is folded into that message so it appears once.
pub(crate) fn seed_conversation(request: &ChatRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(prompt) = request.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        messages.push(Message::system(prompt));
    }
    messages.extend(request.messages.iter().cloned());

    if !request.tools.is_empty() {
        let tool_prompt = build_tool_prompt(&request.tools);
        match messages.first_mut() {
            Some(first) if first.is_system() => {
                first.content.push_str("\n\n");
                first.content.push_str(&tool_prompt);
            }
            _ => messages.insert(0, Message::system(tool_prompt)),
        }
    }

    let mut seeded = request.with_messages(messages);
    seeded.system_prompt = None;
    seeded
}

/// Validate a detected call. `Err` is a ready-made failure that skips the handler.
pub(crate) fn resolve(tools: &[ToolDefinition], detected: &Detected) -> std::result::Result<ToolCall, Outcome> {
    let call = match &detected.call {
        Ok(call) => call,
        Err(error) => {
            warn!(error = error.as_str(), "malformed tool call");
            return Err(Outcome::Failure {
                call: None,
                error: error.clone(),
                suggestion: Some(MALFORMED_CALL_HINT.to_string()),
            });
        }
    };

    validate_call(tools, call).map_err(|e| {
        warn!(tool = call.name.as_str(), error = %e, "tool call rejected");
        let (error, suggestion) = match e {
            Error::Validation { message, context } => (message, context.details),
            other => (other.to_string(), None),
        };
        Outcome::Failure {
            call: Some(call.clone()),
            error,
            suggestion,
        }
    })
}

/// Append the assistant turn (visible text plus the raw tag) and the tool-result message.
pub(crate) fn append_turn(turn: &mut ChatRequest, visible: String, detected: &Detected, outcome: &Outcome) {
    let mut assistant = visible;
    assistant.push_str(&detected.raw);
    turn.messages.push(Message::assistant(assistant));
    turn.messages.push(outcome.message());
}
