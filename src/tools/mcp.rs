//! Adapter exposing an MCP server tool through the [`Tool`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::mcp::{McpClient, McpToolDefinition};

pub struct McpTool {
    client: Arc<McpClient>,
    definition: McpToolDefinition,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, definition: McpToolDefinition) -> Self {
        Self { client, definition }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn parameters_schema(&self) -> Value {
        if self.definition.input_schema.is_null() {
            json!({"type": "object", "properties": {}})
        } else {
            self.definition.input_schema.clone()
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        tracing::info!(server = %self.client.name(), tool = %self.definition.name, "Calling MCP tool");

        let args = if args.is_null() { json!({}) } else { args };
        let result = self.client.call_tool(&self.definition.name, args).await?;
        let text = result.to_text();

        if result.is_error {
            return Err(anyhow::anyhow!("Tool {} failed: {}", self.definition.name, text));
        }
        Ok(text)
    }
}
