//! Resolve a parsed call against the request's tool definitions.

use crate::types::{ToolCall, ToolDefinition, ToolParameter};
use crate::{Error, ErrorContext, Result};
use serde_json::{Number, Value};

fn invalid(message: String, field: String, suggestion: String) -> Error {
    Error::validation_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_details(suggestion)
            .with_source("tool_validator"),
    )
}

/// Check `call` against its definition and return it with defaults filled in and
/// loosely typed string values coerced to the declared type.
///
/// Failures are [`Error::Validation`]; the context's `details` carries a remediation hint
/// for the model.
pub fn validate_call(tools: &[ToolDefinition], call: &ToolCall) -> Result<ToolCall> {
    let Some(def) = tools.iter().find(|t| t.name == call.name) else {
        let known: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        return Err(invalid(
            format!("unknown tool '{}'", call.name),
            "name".to_string(),
            if known.is_empty() {
                "No tools are available; answer without calling a tool.".to_string()
            } else {
                format!("Use one of the available tools: {}.", known.join(", "))
            },
        ));
    };

    let mut resolved = call.clone();
    for (name, param) in &def.parameters {
        let field = format!("params.{}", name);
        let value = match resolved.params.remove(name) {
            Some(Value::Null) | None => match &param.default {
                Some(default) => default.clone(),
                None if param.required => {
                    return Err(invalid(
                        format!("missing required parameter '{}' for tool '{}'", name, def.name),
                        field,
                        format!("Provide '{}' ({}).", name, param.param_type),
                    ));
                }
                None => continue,
            },
            Some(v) => coerce(v, &param.param_type),
        };

        check_type(&value, param).map_err(|expected| {
            invalid(
                format!("parameter '{}' must be {}, got {}", name, expected, value),
                field.clone(),
                format!("Pass '{}' as {}.", name, expected),
            )
        })?;

        if let Some(allowed) = &param.allowed {
            if !allowed.contains(&value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(invalid(
                    format!("parameter '{}' has value {} outside the allowed set", name, value),
                    field,
                    format!("Use one of: {}.", options.join(", ")),
                ));
            }
        }
        resolved.params.insert(name.clone(), value);
    }
    Ok(resolved)
}

/// Sniff a string literal into the declared scalar type; other values pass through.
fn coerce(value: Value, param_type: &str) -> Value {
    let Value::String(s) = &value else {
        return value;
    };
    let literal = s.trim();
    match param_type {
        "integer" => literal
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(value),
        "number" => literal
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        "boolean" => match literal.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

fn check_type(value: &Value, param: &ToolParameter) -> std::result::Result<(), &'static str> {
    let ok = match param.param_type.as_str() {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => return Ok(()),
    };
    if ok {
        return Ok(());
    }
    Err(match param.param_type.as_str() {
        "string" => "a string",
        "integer" => "an integer",
        "number" => "a number",
        "boolean" => "a boolean",
        "object" => "an object",
        _ => "an array",
    })
}
