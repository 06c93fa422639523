use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::errors::RegistryError;
use crate::models::tool::Tool;
use crate::normalize::ToolOutput;
use crate::schema::validate_schema;

/// The code behind a tool.
///
/// Handlers receive arguments that already passed schema validation. Any error they return
/// is shown to the model as the tool result, it does not end the conversation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<ToolOutput>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
{
    async fn call(&self, arguments: Value) -> Result<ToolOutput> {
        (self)(arguments).await
    }
}

/// A registered tool: the schema shown to the model and the handler that runs it
#[derive(Clone)]
pub struct ToolDefinition {
    pub tool: Tool,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

/// Catalog of the tools available to the model, in registration order.
///
/// The registry is filled once during setup and then shared read only, usually behind an
/// `Arc`, with the dispatcher.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Fails without changing the registry if the name is taken or the
    /// parameter schema is not usable.
    pub fn register<H>(&mut self, tool: Tool, handler: H) -> Result<(), RegistryError>
    where
        H: ToolHandler + 'static,
    {
        if self.index.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateTool(tool.name));
        }
        validate_schema(&tool.parameters).map_err(|reason| RegistryError::InvalidSchema {
            tool: tool.name.clone(),
            reason,
        })?;

        tracing::debug!(tool = %tool.name, "registered tool");
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(ToolDefinition {
            tool,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition, RegistryError> {
        self.index
            .get(name)
            .map(|&position| &self.tools[position])
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    /// The tools to advertise to the model, in registration order
    pub fn export_schemas(&self) -> Vec<Tool> {
        self.tools.iter().map(|def| def.tool.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|def| def.tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str) -> Tool {
        Tool::new(
            name,
            "Echo back a message",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
        )
    }

    async fn echo(arguments: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::from(arguments["message"].clone()))
    }

    #[test]
    fn test_register_and_lookup() -> Result<()> {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo"), echo)?;

        let definition = registry.lookup("echo")?;
        assert_eq!(definition.tool.name, "echo");
        assert!(matches!(
            registry.lookup("missing"),
            Err(RegistryError::ToolNotFound(name)) if name == "missing"
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_leaves_registry_unchanged() -> Result<()> {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo"), echo)?;
        let before = registry.export_schemas();

        let mut replacement = echo_tool("echo");
        replacement.description = "A different echo".to_string();
        let err = registry.register(replacement, echo).unwrap_err();

        assert_eq!(err, RegistryError::DuplicateTool("echo".to_string()));
        assert_eq!(registry.export_schemas(), before);
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let mut registry = ToolRegistry::new();
        let tool = Tool::new("broken", "No properties", json!({"type": "object"}));

        let err = registry.register(tool, echo).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { tool, .. } if tool == "broken"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_export_keeps_registration_order() -> Result<()> {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(echo_tool(name), echo)?;
        }

        let names: Vec<_> = registry
            .export_schemas()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_closure_handlers() -> Result<()> {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo"), |_args: Value| async {
            Ok::<_, anyhow::Error>(ToolOutput::from("pong"))
        })?;

        let output = registry
            .lookup("echo")?
            .handler
            .call(json!({"message": "ping"}))
            .await?;
        assert_eq!(output, ToolOutput::Text("pong".to_string()));
        Ok(())
    }
}
