//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::Result;

/// A function the model can call during a realtime session.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// Run the tool. The result must be JSON-serializable; errors are
    /// reported back to the session as a tool error.
    async fn execute(&self, args: &ToolArguments) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

type ToolHandler =
    dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync;

/// Closure-based tool.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use serde_json::json;

    #[tokio::test]
    async fn closure_tool_runs_handler_and_exposes_definition() {
        let tool = FunctionTool::new(
            "echo",
            "Echo the input",
            ToolParameters::object().string("text", "Text", true).build(),
            |args: ToolArguments| async move {
                let text = args.get_str("text")?.to_string();
                Ok::<_, ConsoleError>(json!({ "echo": text }))
            },
        );

        let out = tool
            .execute(&ToolArguments::new(json!({ "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(out, json!({ "echo": "hi" }));

        let definition = tool.definition();
        assert_eq!(definition.name, "echo");
        assert_eq!(definition.kind, "function");
    }
}
