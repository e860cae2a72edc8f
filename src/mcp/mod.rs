//! Minimal MCP (Model Context Protocol) client.
//!
//! The diagram server runs as a child process speaking newline-delimited
//! JSON-RPC 2.0 on stdio. [`McpClient`] performs the handshake, caches the
//! advertised tools and forwards `tools/call` requests on behalf of the agent.

pub mod client;
pub mod error;
pub mod stdio;
pub mod types;

pub use client::McpClient;
pub use error::{McpError, McpResult};
pub use stdio::StdioTransport;
pub use types::{McpToolDefinition, ServerInfo, ToolCallResult};
