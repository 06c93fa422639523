use serde::{Deserialize, Serialize};

use super::role::Role;
use super::tool::{ToolCall, ToolResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
///
/// Fields that do not apply are left out of the serialized form rather than written as
/// `null`: an assistant message that requests tools has no `content` key at all.
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new, empty user message
    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    /// Create a new, empty assistant message
    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create a tool message answering the call with the given id
    pub fn tool<S: Into<String>>(call_id: S) -> Self {
        Message {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(Role::Tool)
        }
    }

    /// Set the text content of the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(text.into());
        self
    }

    /// Add a tool call to the message
    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    /// Add several tool calls, keeping their order
    pub fn with_tool_calls<I: IntoIterator<Item = ToolCall>>(mut self, tool_calls: I) -> Self {
        self.tool_calls.extend(tool_calls);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Get the text content, if any
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

impl From<ToolResult> for Message {
    fn from(result: ToolResult) -> Self {
        Message::tool(result.call_id).with_text(result.content)
    }
}
