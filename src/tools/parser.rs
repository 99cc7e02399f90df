//! Incremental tool-call detector for chunked model output.
//!
//! A call is written by the model as `[tool]{"name": ..., "params": {...}}[/tool]`.
//! Providers deliver text in arbitrarily small fragments, so an opening or closing
//! marker may be split across any number of chunks. The parser forwards plain text as
//! soon as it can prove it is not part of a marker and withholds everything inside a tag.

use crate::types::ToolCall;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const TOOL_OPEN: &str = "[tool]";
pub const TOOL_CLOSE: &str = "[/tool]";

/// Opening prefix that also counts as a marker when followed by a newline or brace.
const OPEN_PREFIX: &str = "[tool";

#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    /// Visible text, safe to forward.
    Text(String),
    /// An opening marker was seen; the call body is being buffered.
    ToolPending,
    /// A complete, well-formed call. `raw` is the tag text as the model wrote it.
    ToolCall { call: ToolCall, raw: String },
    /// The tag closed but its body was not a valid call.
    ToolCallError { error: String, raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    InTag,
}

#[derive(Deserialize)]
struct CallBody {
    name: String,
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

/// Two-state machine: `Scanning` forwards text, `InTag` accumulates a call body.
#[derive(Debug, Clone)]
pub struct ToolStreamParser {
    state: State,
    buffer: String,
    tool_content: String,
    opening: String,
}

impl Default for ToolStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolStreamParser {
    pub fn new() -> Self {
        Self {
            state: State::Scanning,
            buffer: String::new(),
            tool_content: String::new(),
            opening: String::new(),
        }
    }

    pub fn in_tag(&self) -> bool {
        self.state == State::InTag
    }

    /// Append a chunk without processing it.
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Feed a chunk and drain every event it makes available.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParserEvent> {
        self.push(chunk);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Run one step. Each step yields at most one event; `None` means more input is needed.
    pub fn next_event(&mut self) -> Option<ParserEvent> {
        match self.state {
            State::Scanning => self.step_scanning(),
            State::InTag => self.step_in_tag(),
        }
    }

    /// End of turn: flush text held back as a possible marker prefix.
    ///
    /// An unterminated tag is discarded so tag syntax never reaches the caller.
    pub fn finish(&mut self) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        match self.state {
            State::Scanning if !self.buffer.is_empty() => {
                events.push(ParserEvent::Text(std::mem::take(&mut self.buffer)));
            }
            State::InTag => {
                debug!(
                    buffered = self.tool_content.len() + self.buffer.len(),
                    "dropping unterminated tool tag"
                );
            }
            State::Scanning => {}
        }
        self.reset();
        events
    }

    fn reset(&mut self) {
        self.state = State::Scanning;
        self.buffer.clear();
        self.tool_content.clear();
        self.opening.clear();
    }

    fn step_scanning(&mut self) -> Option<ParserEvent> {
        if self.buffer.is_empty() {
            return None;
        }

        if let Some((pos, len)) = find_open_marker(&self.buffer) {
            if pos > 0 {
                let text: String = self.buffer.drain(..pos).collect();
                return Some(ParserEvent::Text(text));
            }
            self.opening = self.buffer.drain(..len).collect();
            self.tool_content.clear();
            self.state = State::InTag;
            return Some(ParserEvent::ToolPending);
        }

        let flush_to = held_back_from(&self.buffer, OPEN_PREFIX, true).unwrap_or(self.buffer.len());
        if flush_to == 0 {
            return None;
        }
        let text: String = self.buffer.drain(..flush_to).collect();
        Some(ParserEvent::Text(text))
    }

    fn step_in_tag(&mut self) -> Option<ParserEvent> {
        if let Some(pos) = self.buffer.find(TOOL_CLOSE) {
            self.tool_content.extend(self.buffer.drain(..pos));
            self.buffer.drain(..TOOL_CLOSE.len());
            let content = std::mem::take(&mut self.tool_content);
            let raw = format!("{}{}{}", self.opening, content, TOOL_CLOSE);
            self.opening.clear();
            self.state = State::Scanning;
            return Some(match parse_call_body(&content) {
                Ok(call) => ParserEvent::ToolCall { call, raw },
                Err(error) => ParserEvent::ToolCallError { error, raw },
            });
        }

        // Everything that cannot start the closing marker moves into the body.
        let keep_from = held_back_from(&self.buffer, TOOL_CLOSE, false).unwrap_or(self.buffer.len());
        self.tool_content.extend(self.buffer.drain(..keep_from));
        None
    }
}

/// Position and length of the first opening marker in `text`.
///
/// `[tool]` is consumed whole. A bare `[tool` followed by a newline or `{` is also an
/// opening; the following character stays in the body.
fn find_open_marker(text: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = text[from..].find(OPEN_PREFIX) {
        let pos = from + offset;
        let after = pos + OPEN_PREFIX.len();
        match text.as_bytes().get(after) {
            Some(b']') => return Some((pos, TOOL_OPEN.len())),
            Some(b'\n') | Some(b'\r') | Some(b'{') => return Some((pos, OPEN_PREFIX.len())),
            // Undecided until the next character arrives.
            None => return None,
            Some(_) => from = after,
        }
    }
    None
}

/// Start of a trailing suffix of `text` that could still grow into `marker`.
///
/// With `inclusive`, a suffix equal to the whole marker also counts (used for the bare
/// `[tool` prefix, whose meaning depends on the next character).
fn held_back_from(text: &str, marker: &str, inclusive: bool) -> Option<usize> {
    let pos = text.rfind('[')?;
    let tail = &text[pos..];
    let partial = tail.len() < marker.len() || (inclusive && tail.len() == marker.len());
    (partial && marker.starts_with(tail)).then_some(pos)
}

fn parse_call_body(content: &str) -> std::result::Result<ToolCall, String> {
    let body: CallBody = serde_json::from_str(content.trim())
        .map_err(|e| format!("tool call is not valid JSON: {}", e))?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err("tool call has an empty name".to_string());
    }
    Ok(ToolCall::new(name, body.params.unwrap_or_default()))
}

/// Result of scanning a complete (non-streamed) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentScan {
    /// Visible text before the first call, or the whole text when there is none.
    pub text: String,
    /// First [`ParserEvent::ToolCall`] or [`ParserEvent::ToolCallError`], if any.
    pub tool: Option<ParserEvent>,
}

/// Scan a whole response with the same grammar the streaming path uses.
pub fn scan_content(content: &str) -> ContentScan {
    let mut parser = ToolStreamParser::new();
    let mut text = String::new();
    for event in parser.feed(content) {
        match event {
            ParserEvent::Text(t) => text.push_str(&t),
            ParserEvent::ToolPending => {}
            detected @ (ParserEvent::ToolCall { .. } | ParserEvent::ToolCallError { .. }) => {
                return ContentScan {
                    text,
                    tool: Some(detected),
                };
            }
        }
    }
    for event in parser.finish() {
        if let ParserEvent::Text(t) = event {
            text.push_str(&t);
        }
    }
    ContentScan { text, tool: None }
}
