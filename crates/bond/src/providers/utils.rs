use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use super::base::{ModelResponse, Usage};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
}

/// Convert internal Message format to OpenAI's chat completions message specification
///
/// Absent fields stay absent: an assistant message that only carries tool calls is sent
/// without a `content` key.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut converted = Map::new();
            converted.insert("role".to_string(), json!(message.role));

            match message.role {
                Role::User => {
                    converted.insert("content".to_string(), json!(message.text().unwrap_or("")));
                }
                Role::Assistant => {
                    if let Some(text) = &message.content {
                        converted.insert("content".to_string(), json!(text));
                    }
                    if message.has_tool_calls() {
                        let tool_calls: Vec<Value> = message
                            .tool_calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": sanitize_function_name(&call.name),
                                        "arguments": encode_arguments(&call.arguments),
                                    }
                                })
                            })
                            .collect();
                        converted.insert("tool_calls".to_string(), json!(tool_calls));
                    }
                }
                Role::Tool => {
                    converted.insert(
                        "tool_call_id".to_string(),
                        json!(message.tool_call_id.as_deref().unwrap_or_default()),
                    );
                    converted.insert("content".to_string(), json!(message.text().unwrap_or("")));
                }
            }

            Value::Object(converted)
        })
        .collect()
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    ensure_unique_names(tools)?;
    Ok(tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect())
}

/// Convert OpenAI's API response to a model response
pub fn openai_response_to_message(response: &Value) -> Result<ModelResponse> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("Response did not contain a message: {}", response))?;

    let text = original
        .get("content")
        .and_then(Value::as_str)
        .map(String::from);

    let tool_calls = original
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    let id = call["id"].as_str().unwrap_or_default();
                    let name = call["function"]["name"].as_str().unwrap_or_default();
                    ToolCall::new(id, name, decode_arguments(&call["function"]["arguments"]))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelResponse { text, tool_calls })
}

pub fn openai_usage(response: &Value) -> Usage {
    let Some(usage) = response.get("usage") else {
        return Usage::default();
    };

    let input_tokens = token_count(usage, "prompt_tokens");
    let output_tokens = token_count(usage, "completion_tokens");
    let total_tokens = token_count(usage, "total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Convert internal messages to the Anthropic messages API format
///
/// Tool calls become `tool_use` blocks on the assistant turn. Consecutive tool messages are
/// gathered into a single user turn of `tool_result` blocks, since Anthropic expects every
/// result for a turn in the message that directly follows it.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    for message in messages {
        if message.role != Role::Tool && !pending_results.is_empty() {
            spec.push(json!({"role": "user", "content": std::mem::take(&mut pending_results)}));
        }

        match message.role {
            Role::User => {
                spec.push(json!({"role": "user", "content": message.text().unwrap_or("")}));
            }
            Role::Assistant if message.has_tool_calls() => {
                let mut blocks = Vec::new();
                if let Some(text) = message.text().filter(|text| !text.is_empty()) {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                for call in &message.tool_calls {
                    let input = match &call.arguments {
                        Value::Object(_) => call.arguments.clone(),
                        _ => json!({}),
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                spec.push(json!({"role": "assistant", "content": blocks}));
            }
            Role::Assistant => {
                // Anthropic rejects empty text blocks
                if let Some(text) = message.text().filter(|text| !text.is_empty()) {
                    spec.push(json!({"role": "assistant", "content": text}));
                }
            }
            Role::Tool => {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.as_deref().unwrap_or_default(),
                    "content": message.text().unwrap_or(""),
                }));
            }
        }
    }

    if !pending_results.is_empty() {
        spec.push(json!({"role": "user", "content": pending_results}));
    }

    spec
}

pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    ensure_unique_names(tools)?;
    Ok(tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters,
            })
        })
        .collect())
}

/// Convert an Anthropic messages API response to a model response
pub fn anthropic_response_to_message(response: &Value) -> Result<ModelResponse> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API: {}", response))?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    texts.push(text);
                }
            }
            Some("tool_use") => tool_calls.push(ToolCall::new(
                block["id"].as_str().unwrap_or_default(),
                block["name"].as_str().unwrap_or_default(),
                block.get("input").cloned().unwrap_or(Value::Null),
            )),
            // thinking and other block types carry nothing for the conversation
            _ => {}
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    Ok(ModelResponse { text, tool_calls })
}

pub fn anthropic_usage(response: &Value) -> Usage {
    let Some(usage) = response.get("usage") else {
        return Usage::default();
    };

    let input_tokens = token_count(usage, "input_tokens");
    let output_tokens = token_count(usage, "output_tokens");
    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Tool arguments arrive as a JSON encoded string from OpenAI style APIs. A string that does
/// not decode is kept as is so the dispatcher can report it back to the model.
fn decode_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(encoded) if encoded.trim().is_empty() => Value::Null,
        Value::String(encoded) => {
            serde_json::from_str(encoded).unwrap_or_else(|_| Value::String(encoded.clone()))
        }
        other => other.clone(),
    }
}

/// Inverse of `decode_arguments`. Arguments that never decoded go back exactly as the model
/// sent them instead of being quoted a second time.
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

fn token_count(usage: &Value, key: &str) -> Option<i32> {
    usage.get(key).and_then(Value::as_i64).map(|v| v as i32)
}

fn ensure_unique_names(tools: &[Tool]) -> Result<()> {
    let mut tool_names = HashSet::new();
    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
    }
    Ok(())
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "content": null,
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    fn conversation() -> Vec<Message> {
        vec![
            Message::user().with_text("ping localhost and add 2 and 2"),
            Message::assistant()
                .with_tool_call(ToolCall::new("c1", "ping", json!({"host": "localhost"})))
                .with_tool_call(ToolCall::new(
                    "c2",
                    "calculate",
                    json!({"operation": "add", "a": 2, "b": 2}),
                )),
            Message::tool("c1").with_text("pong"),
            Message::tool("c2").with_text("4"),
            Message::assistant().with_text("Host is up and the sum is 4."),
        ]
    }

    #[test]
    fn test_openai_assistant_tool_calls_have_no_content() {
        let spec = messages_to_openai_spec(&conversation());

        assert_eq!(spec.len(), 5);
        assert!(spec[1].get("content").is_none());
        assert_eq!(spec[1]["tool_calls"][0]["function"]["name"], "ping");
        assert_eq!(
            spec[1]["tool_calls"][1]["function"]["arguments"],
            json!({"operation": "add", "a": 2, "b": 2}).to_string()
        );
        assert_eq!(spec[2], json!({"role": "tool", "tool_call_id": "c1", "content": "pong"}));
        assert_eq!(spec[3]["content"], "4");
        assert_eq!(spec[4], json!({"role": "assistant", "content": "Host is up and the sum is 4."}));
    }

    #[test]
    fn test_openai_function_names_are_sanitized() {
        let messages = vec![Message::assistant()
            .with_tool_call(ToolCall::new("1", "bad name!", json!({})))];
        let spec = messages_to_openai_spec(&messages);
        assert_eq!(spec[0]["tool_calls"][0]["function"]["name"], "bad_name_");
    }

    #[test]
    fn test_openai_tool_response() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response)?;

        assert_eq!(message.text, None);
        assert_eq!(
            message.tool_calls,
            vec![ToolCall::new("1", "example_fn", json!({"param": "value"}))]
        );
        assert_eq!(openai_usage(&response), Usage::new(Some(10), Some(25), Some(35)));
        Ok(())
    }

    #[test]
    fn test_openai_undecodable_arguments_are_kept() -> Result<()> {
        let response = json!({
            "choices": [{"message": {"tool_calls": [{
                "id": "1",
                "function": {"name": "calculate", "arguments": "{not json"}
            }]}}]
        });
        let message = openai_response_to_message(&response)?;
        assert_eq!(message.tool_calls[0].arguments, json!("{not json"));

        // sent back in history exactly as received
        let history = vec![Message::assistant().with_tool_calls(message.tool_calls)];
        let spec = messages_to_openai_spec(&history);
        assert_eq!(spec[0]["tool_calls"][0]["function"]["arguments"], "{not json");
        Ok(())
    }

    #[test]
    fn test_openai_missing_choices_is_an_error() {
        assert!(openai_response_to_message(&json!({"id": "x"})).is_err());
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {"input": {"type": "string"}},
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool.clone()])?;
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["parameters"], tool.parameters);

        assert!(tools_to_openai_spec(&[tool.clone(), tool]).is_err());
        Ok(())
    }

    #[test]
    fn test_anthropic_groups_tool_results() {
        let spec = messages_to_anthropic_spec(&conversation());

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[0], json!({"role": "user", "content": "ping localhost and add 2 and 2"}));
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"][0]["type"], "tool_use");
        assert_eq!(spec[1]["content"][1]["input"], json!({"operation": "add", "a": 2, "b": 2}));
        assert_eq!(
            spec[2],
            json!({"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "c1", "content": "pong"},
                {"type": "tool_result", "tool_use_id": "c2", "content": "4"}
            ]})
        );
        assert_eq!(spec[3]["content"], "Host is up and the sum is 4.");
    }

    #[test]
    fn test_anthropic_trailing_results_are_flushed() {
        let mut messages = conversation();
        messages.pop();
        let spec = messages_to_anthropic_spec(&messages);
        assert_eq!(spec.len(), 3);
        assert_eq!(spec[2]["content"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_anthropic_skips_empty_assistant_text() {
        let messages = vec![
            Message::user().with_text("hi"),
            Message::assistant().with_text(""),
            Message::user().with_text("still there?"),
        ];
        let spec = messages_to_anthropic_spec(&messages);
        assert_eq!(spec.len(), 2);
    }

    #[test]
    fn test_anthropic_response() -> Result<()> {
        let response = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "ping", "input": {"host": "example.com"}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 8}
        });

        let message = anthropic_response_to_message(&response)?;
        assert_eq!(message.text.as_deref(), Some("Let me check."));
        assert_eq!(
            message.tool_calls,
            vec![ToolCall::new("toolu_1", "ping", json!({"host": "example.com"}))]
        );
        assert_eq!(anthropic_usage(&response), Usage::new(Some(12), Some(8), Some(20)));
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });

        let result = check_openai_context_length_error(&error);
        assert!(result.is_some());
        assert_eq!(
            result.unwrap().to_string(),
            "Context length exceeded. Message: This message is too long"
        );

        let error = json!({
            "code": "other_error",
            "message": "Some other error"
        });
        assert!(check_openai_context_length_error(&error).is_none());
    }
}
