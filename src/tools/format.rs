//! Tool prompt and tool-result messages.

use super::parser::{TOOL_CLOSE, TOOL_OPEN};
use crate::types::ToolDefinition;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt::Write as _;

static TAG_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(/?)\s*tool").expect("valid tool tag regex"));

const DEFAULT_SUGGESTION: &str =
    "Check the tool name and parameters against the tool list, then try again or answer without the tool.";

/// Break any tag syntax in `text` so the parser can never read it as a marker.
pub fn neutralize_tags(text: &str) -> String {
    TAG_SYNTAX.replace_all(text, "[${1} tool").into_owned()
}

/// Tool-usage instructions listing every tool and the exact call grammar.
pub fn build_tool_prompt(tools: &[ToolDefinition]) -> String {
    let mut out = String::new();
    out.push_str("You can call tools to help answer the user.\n");
    out.push_str("To call a tool, reply with exactly one block in this form and nothing after it:\n");
    let _ = writeln!(
        out,
        "{}{{\"name\": \"<tool name>\", \"params\": {{<parameter>: <value>}}}}{}",
        TOOL_OPEN, TOOL_CLOSE
    );
    out.push_str("The tool result arrives in the next message. Call at most one tool per reply.\n");
    out.push_str("If no tool is needed, answer directly.\n\nAvailable tools:\n");

    for tool in tools {
        let _ = write!(out, "- {}", tool.name);
        if !tool.description.is_empty() {
            let _ = write!(out, ": {}", tool.description);
        }
        out.push('\n');
        for (name, param) in &tool.parameters {
            let mut traits = vec![param.param_type.clone()];
            if param.required {
                traits.push("required".to_string());
            }
            if let Some(allowed) = &param.allowed {
                let values: Vec<String> = allowed.iter().map(Value::to_string).collect();
                traits.push(format!("one of {}", values.join(", ")));
            }
            if let Some(default) = &param.default {
                traits.push(format!("default {}", default));
            }
            let _ = write!(out, "  - {} ({})", name, traits.join(", "));
            if !param.description.is_empty() {
                let _ = write!(out, ": {}", param.description);
            }
            out.push('\n');
        }
    }
    out
}

/// User-role message carrying a successful tool result back to the model.
pub fn format_tool_result(name: &str, data: &Value) -> String {
    let payload = match data {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    format!(
        "Tool result for `{}`:\n{}\n\nUse this result to continue answering the user.",
        neutralize_tags(name),
        neutralize_tags(&payload)
    )
}

/// User-role message reporting a failed tool call, with a remediation hint.
pub fn format_tool_error(name: &str, error: &str, suggestion: Option<&str>) -> String {
    format!(
        "Tool `{}` failed: {}\nSuggestion: {}",
        neutralize_tags(name),
        neutralize_tags(error),
        neutralize_tags(suggestion.unwrap_or(DEFAULT_SUGGESTION))
    )
}
