use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::ToolError;
use crate::models::tool::{ToolCall, ToolResult};
use crate::normalize::{normalize, ToolOutput};
use crate::registry::ToolRegistry;
use crate::schema::validate_arguments;

/// Runs the tool calls of one model turn against the registry.
///
/// Every call produces exactly one result, in the order the calls were requested. Failures
/// of any kind (unknown tool, bad arguments, handler errors or panics, timeouts) are turned
/// into `error: ...` content instead of being returned to the caller.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Abort any handler that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run all calls concurrently and collect their results in request order
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let futures: Vec<_> = calls.iter().map(|call| self.dispatch_one(call)).collect();

        // join_all yields outputs in the order of its input, not in completion order
        let outputs = futures::future::join_all(futures).await;

        calls
            .iter()
            .zip(outputs)
            .map(|(call, content)| ToolResult::new(call.id.clone(), content))
            .collect()
    }

    async fn dispatch_one(&self, call: &ToolCall) -> String {
        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        match self.run(call).await {
            Ok(output) => normalize(output),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                format!("error: {}", e)
            }
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let definition = self
            .registry
            .lookup(&call.name)
            .map_err(|_| ToolError::ToolNotFound(call.name.clone()))?;

        let arguments = validate_arguments(&definition.tool.parameters, &call.arguments)
            .map_err(|reason| ToolError::InvalidArguments {
                tool: call.name.clone(),
                reason,
            })?;

        let invocation = AssertUnwindSafe(definition.handler.call(arguments)).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool: call.name.clone(),
                    timeout: limit,
                })?,
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ToolError::ExecutionError(format!("{:#}", e))),
            Err(panic) => Err(ToolError::ExecutionError(panic_message(panic))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("tool panicked: {}", message)
    } else {
        "tool panicked".to_string()
    }
}
