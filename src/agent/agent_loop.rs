//! Core agent loop implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient, Role, ToolCall};
use crate::tools::ToolRegistry;

use super::AgentInvoker;

/// The autonomous architect agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_iterations: usize,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, model: String, max_iterations: usize) -> Self {
        Self {
            llm,
            model,
            max_iterations,
        }
    }

    /// Execute a single tool call. Failures are reported back to the model as text.
    async fn execute_tool_call(&self, tool_call: &ToolCall, tools: &ToolRegistry) -> String {
        let args: serde_json::Value =
            serde_json::from_str(&tool_call.function.arguments).unwrap_or(serde_json::Value::Null);

        match tools.execute(&tool_call.function.name, args).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[async_trait]
impl AgentInvoker for Agent {
    async fn invoke(&self, system_prompt: &str, query: &str, tools: &ToolRegistry) -> anyhow::Result<String> {
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(query)];
        let tool_schemas = tools.get_tool_schemas();

        for iteration in 0..self.max_iterations {
            tracing::debug!("Agent iteration {}", iteration + 1);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(tool_schemas.as_slice()))
                .await?;

            if let Some(tool_calls) = response.tool_calls.filter(|calls| !calls.is_empty()) {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for tool_call in &tool_calls {
                    tracing::info!(
                        tool = %tool_call.function.name,
                        args = %truncate_for_log(&tool_call.function.arguments, 500),
                        "Agent requested tool"
                    );
                    let result = self.execute_tool_call(tool_call, tools).await;
                    tracing::debug!(result = %truncate_for_log(&result, 1000), "Tool finished");
                    messages.push(ChatMessage::tool_result(tool_call.id.clone(), result));
                }

                continue;
            }

            // No tool calls - this is the final response
            if let Some(content) = response.content {
                return Ok(content);
            }

            return Err(anyhow::anyhow!("LLM returned empty response"));
        }

        Err(anyhow::anyhow!(
            "Max iterations ({}) reached without completion",
            self.max_iterations
        ))
    }
}

/// Truncate a string for logging purposes, respecting char boundaries.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, LlmError, ToolDefinition};
    use crate::tools::Tool;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replays canned responses and records the messages of each call.
    struct ScriptedLlm {
        responses: Mutex<Vec<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(mut responses: Vec<ChatResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatResponse, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses.lock().unwrap().pop().ok_or(LlmError::EmptyChoices)
        }
    }

    struct FakeDiagramTool;

    #[async_trait]
    impl Tool for FakeDiagramTool {
        fn name(&self) -> &str {
            "generate_diagram"
        }

        fn description(&self) -> &str {
            "Render a diagram"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(format!("saved {}", args["name"].as_str().unwrap_or("?")))
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            kind: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeDiagramTool));
        registry
    }

    #[tokio::test]
    async fn runs_tools_then_returns_final_text() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ChatResponse {
                tool_calls: Some(vec![tool_call("generate_diagram", r#"{"name":"wan.png"}"#)]),
                ..Default::default()
            },
            ChatResponse {
                content: Some("The diagram is saved at: /tmp/wan.png".into()),
                ..Default::default()
            },
        ]));
        let agent = Agent::new(llm.clone(), "test-model".into(), 5);

        let reply = agent.invoke("system", "design it", &registry()).await.unwrap();
        assert_eq!(reply, "The diagram is saved at: /tmp/wan.png");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let tool_message = seen[1].last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.content.as_deref(), Some("saved wan.png"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ChatResponse {
                tool_calls: Some(vec![tool_call("missing_tool", "{}")]),
                ..Default::default()
            },
            ChatResponse {
                content: Some("done".into()),
                ..Default::default()
            },
        ]));
        let agent = Agent::new(llm.clone(), "test-model".into(), 5);

        agent.invoke("system", "q", &registry()).await.unwrap();
        let seen = llm.seen.lock().unwrap();
        let content = seen[1].last().unwrap().content.clone().unwrap();
        assert!(content.starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn stops_after_max_iterations() {
        let looping: Vec<ChatResponse> = (0..3)
            .map(|_| ChatResponse {
                tool_calls: Some(vec![tool_call("generate_diagram", "{}")]),
                ..Default::default()
            })
            .collect();
        let agent = Agent::new(Arc::new(ScriptedLlm::new(looping)), "m".into(), 2);
        let err = agent.invoke("s", "q", &registry()).await.unwrap_err();
        assert!(err.to_string().contains("Max iterations (2)"));
    }

    #[test]
    fn truncation_keeps_char_boundaries() {
        assert_eq!(truncate_for_log("héllo", 2), "h... [truncated]");
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}
