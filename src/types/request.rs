//! Caller-facing chat request.

use crate::types::message::Message;
use crate::types::tool::ToolDefinition;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

/// Immutable chat request. The orchestrator works on derived copies of `messages`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Provider to use. When absent, auto mode picks candidates by priority.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tool_iterations: u32,
    pub cancel: Option<CancellationToken>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            provider: None,
            model: None,
            messages,
            tools: Vec::new(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            cancel: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn max_tool_iterations(mut self, n: u32) -> Self {
        self.max_tool_iterations = n;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Copy of this request with a different conversation.
    pub fn with_messages(&self, messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}
