use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::{McpError, McpResult};
use super::stdio::StdioTransport;
use super::types::{InitializeResult, ListToolsResult, McpToolDefinition, ServerInfo, ToolCallResult, PROTOCOL_VERSION};
use crate::config::McpServerConfig;

/// Connected MCP server with its advertised tool list.
pub struct McpClient {
    name: String,
    transport: StdioTransport,
    tools: Vec<McpToolDefinition>,
}

impl McpClient {
    /// Spawn the configured server and complete the handshake.
    pub async fn spawn(config: &McpServerConfig) -> McpResult<Self> {
        let transport = StdioTransport::spawn(config)?;
        Self::connect(config.command.clone(), transport).await
    }

    /// Run `initialize`, `notifications/initialized` and `tools/list` over an
    /// already-open transport. The transport is closed if any step fails.
    pub async fn connect(name: String, transport: StdioTransport) -> McpResult<Self> {
        match handshake(&transport).await {
            Ok((server_info, tools)) => {
                info!(
                    server = %name,
                    remote = ?server_info.as_ref().map(|s| &s.name),
                    tools = tools.len(),
                    "MCP server ready"
                );
                Ok(Self {
                    name,
                    transport,
                    tools,
                })
            }
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!(server = %name, error = %close_err, "Failed to close MCP server after handshake error");
                }
                Err(e)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[McpToolDefinition] {
        &self.tools
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        let result = self
            .transport
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/call result: {e}")))
    }

    pub async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}

async fn handshake(transport: &StdioTransport) -> McpResult<(Option<ServerInfo>, Vec<McpToolDefinition>)> {
    let init = transport
        .request(
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
        )
        .await?;
    let init: InitializeResult = serde_json::from_value(init)
        .map_err(|e| McpError::Protocol(format!("Invalid initialize result: {e}")))?;

    transport.notify("notifications/initialized", None).await?;

    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let page = transport.request("tools/list", params).await?;
        let page: ListToolsResult = serde_json::from_value(page)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/list result: {e}")))?;
        tools.extend(page.tools);
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok((init.server_info, tools))
}
