//! Agent module - the single agent invocation.
//!
//! The agent follows a "tools in a loop" pattern inside one invocation:
//! 1. Build context with the system prompt and the design query
//! 2. Call the LLM with the session's tools
//! 3. If the LLM requests tool calls, execute them and feed results back
//! 4. Return the first response without tool calls as the agent's reply
//!
//! Callers see only [`AgentInvoker`]: prompt, query and tools in, free text out.

mod agent_loop;
mod prompt;

use async_trait::async_trait;

use crate::tools::ToolRegistry;

pub use agent_loop::Agent;
pub use prompt::{build_system_prompt, DESIGN_QUERY};

/// Opaque agent call. No structure is assumed in the returned text.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, system_prompt: &str, query: &str, tools: &ToolRegistry) -> anyhow::Result<String>;
}
