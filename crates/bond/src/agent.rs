use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::dispatcher::ToolDispatcher;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::ToolCall;
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;
use crate::store::MessageStore;

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 20;

/// What to do when the model ends a turn without any text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResponsePolicy {
    /// Record and return an empty answer
    #[default]
    Substitute,
    /// Fail the turn with `AgentError::SerializationError`
    Reject,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Dispatch cycles allowed in a single call to `process`
    pub max_tool_iterations: usize,
    /// Sent with every request, omitted when empty
    pub system_prompt: String,
    pub empty_response: EmptyResponsePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            system_prompt: String::new(),
            empty_response: EmptyResponsePolicy::default(),
        }
    }
}

enum TurnState {
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Done(String),
}

/// Agent drives a model through tool calls until it produces a final answer
pub struct Agent {
    provider: Box<dyn Provider>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, dispatcher: ToolDispatcher, config: AgentConfig) -> Self {
        Self {
            provider,
            dispatcher,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one user turn to completion and return the model's final text.
    ///
    /// Messages produced during the turn are staged and only written to `store` once the
    /// turn finishes, so a provider error, a malformed response or a dropped future leaves
    /// the store untouched. The one exception is `LoopLimitExceeded`, which commits the
    /// transcript gathered so far for inspection.
    pub async fn process(&self, store: &mut MessageStore, input: &str) -> AgentResult<String> {
        let tools = self.dispatcher.registry().export_schemas();
        let mut turn = vec![Message::user().with_text(input)];
        let mut iterations = 0;
        let mut state = TurnState::AwaitingModel;

        info!(tools = tools.len(), "starting turn");

        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    let context = [store.messages(), turn.as_slice()].concat();
                    debug!(messages = context.len(), "calling model");
                    let (response, usage) = self
                        .provider
                        .complete(&self.config.system_prompt, &context, &tools)
                        .await?;
                    debug!(
                        input_tokens = ?usage.input_tokens,
                        output_tokens = ?usage.output_tokens,
                        tool_calls = response.tool_calls.len(),
                        "model responded"
                    );

                    if !response.has_tool_calls() {
                        TurnState::Done(self.final_text(response.text)?)
                    } else {
                        check_tool_calls(&response.tool_calls)?;
                        if iterations >= self.config.max_tool_iterations {
                            warn!(iterations, "tool iteration limit reached");
                            store.extend(turn);
                            return Err(AgentError::LoopLimitExceeded { iterations });
                        }
                        if response.text.is_some() {
                            debug!("dropping text sent alongside tool calls");
                        }
                        TurnState::DispatchingTools(response.tool_calls)
                    }
                }
                TurnState::DispatchingTools(calls) => {
                    iterations += 1;
                    let results = self.dispatcher.dispatch(&calls).await;
                    turn.push(Message::assistant().with_tool_calls(calls));
                    turn.extend(results.into_iter().map(Message::from));
                    TurnState::AwaitingModel
                }
                TurnState::Done(text) => {
                    turn.push(Message::assistant().with_text(text.clone()));
                    store.extend(turn);
                    info!(iterations, "turn complete");
                    return Ok(text);
                }
            };
        }
    }

    fn final_text(&self, text: Option<String>) -> AgentResult<String> {
        match text.filter(|text| !text.is_empty()) {
            Some(text) => Ok(text),
            None => match self.config.empty_response {
                EmptyResponsePolicy::Substitute => {
                    warn!("model returned an empty answer, recording empty content");
                    Ok(String::new())
                }
                EmptyResponsePolicy::Reject => Err(AgentError::SerializationError(
                    "model returned neither text nor tool calls".to_string(),
                )),
            },
        }
    }
}

fn check_tool_calls(calls: &[ToolCall]) -> AgentResult<()> {
    let mut seen = HashSet::new();
    for call in calls {
        if call.name.is_empty() {
            return Err(AgentError::SerializationError(format!(
                "tool call '{}' has no name",
                call.id
            )));
        }
        if call.id.is_empty() {
            return Err(AgentError::SerializationError(format!(
                "call to '{}' has no id",
                call.name
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(AgentError::SerializationError(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(())
}
