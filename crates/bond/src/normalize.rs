//! Turning tool handler output into message content.
//!
//! Handlers return a [`ToolOutput`] that already says which kind of value it holds, and
//! [`normalize`] maps each kind to text with one fixed rule. Text is passed through as is,
//! scalars use their plain string form and aggregates are encoded as JSON. The dispatcher is
//! the only caller, once per result, so handlers must not pre-encode their own output.
use serde::Serialize;
use serde_json::Value;

/// The value a tool handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Integer(i64),
    /// Integers above `i64::MAX`
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    /// The handler completed without producing a value
    Empty,
    /// A JSON object or array
    Structured(Value),
}

impl ToolOutput {
    /// Serialize any value and classify the result
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self::from)
    }
}

/// Render a handler's output as the content of a tool message
pub fn normalize(output: ToolOutput) -> String {
    match output {
        ToolOutput::Text(text) => text,
        ToolOutput::Integer(n) => n.to_string(),
        ToolOutput::Unsigned(n) => n.to_string(),
        ToolOutput::Float(n) => n.to_string(),
        ToolOutput::Bool(b) => b.to_string(),
        ToolOutput::Empty => "null".to_string(),
        ToolOutput::Structured(value) => value.to_string(),
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ToolOutput::Text(text),
            Value::Bool(b) => ToolOutput::Bool(b),
            Value::Null => ToolOutput::Empty,
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ToolOutput::Integer(i),
                (None, Some(u)) => ToolOutput::Unsigned(u),
                (None, None) => ToolOutput::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            aggregate @ (Value::Array(_) | Value::Object(_)) => ToolOutput::Structured(aggregate),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<i64> for ToolOutput {
    fn from(n: i64) -> Self {
        ToolOutput::Integer(n)
    }
}

impl From<i32> for ToolOutput {
    fn from(n: i32) -> Self {
        ToolOutput::Integer(n.into())
    }
}

impl From<u64> for ToolOutput {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => ToolOutput::Integer(i),
            Err(_) => ToolOutput::Unsigned(n),
        }
    }
}

impl From<f64> for ToolOutput {
    fn from(n: f64) -> Self {
        ToolOutput::Float(n)
    }
}

impl From<bool> for ToolOutput {
    fn from(b: bool) -> Self {
        ToolOutput::Bool(b)
    }
}

impl From<()> for ToolOutput {
    fn from(_: ()) -> Self {
        ToolOutput::Empty
    }
}
