use std::time::Duration;
use thiserror::Error;

/// Failures of a single tool call. These never abort a conversation, the dispatcher
/// renders them into the tool result so the model can react.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    ExecutionError(String),

    #[error("tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
}

/// Errors raised while building the tool registry at startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("a tool named '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid parameter schema for '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

/// Errors that end a call to `Agent::process`
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("malformed model response: {0}")]
    SerializationError(String),

    #[error("model kept requesting tools after {iterations} tool rounds")]
    LoopLimitExceeded { iterations: usize },

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
