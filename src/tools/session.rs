//! Scoped tool sessions.
//!
//! A [`ToolProvider`] opens a [`ToolSession`]; [`with_tool_session`] runs a
//! body against the session's registry and closes the session afterwards,
//! whether the body succeeded or failed.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{McpTool, ToolRegistry};
use crate::config::McpServerConfig;
use crate::mcp::McpClient;

/// Source of tool sessions.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn ToolSession>>;
}

/// An open set of tools. Must be closed exactly once.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn registry(&self) -> ToolRegistry;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Open a session, run `body` with its tools, then close the session.
///
/// The body's result is returned as-is; a failure to close is logged and does
/// not mask it.
pub async fn with_tool_session<P, F, Fut, T>(provider: &P, body: F) -> anyhow::Result<T>
where
    P: ToolProvider + ?Sized,
    F: FnOnce(ToolRegistry) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let session = provider.open().await?;
    let result = body(session.registry()).await;

    match session.close().await {
        Ok(()) => debug!("Tool session closed"),
        Err(e) => warn!("Failed to close tool session: {}", e),
    }

    result
}

/// Launches the diagram MCP server over stdio for each session.
pub struct McpToolProvider {
    config: McpServerConfig,
}

impl McpToolProvider {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn open(&self) -> anyhow::Result<Box<dyn ToolSession>> {
        let client = McpClient::spawn(&self.config).await?;
        Ok(Box::new(McpSession {
            client: Arc::new(client),
        }))
    }
}

struct McpSession {
    client: Arc<McpClient>,
}

#[async_trait]
impl ToolSession for McpSession {
    fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for definition in self.client.tools() {
            registry.register(Arc::new(McpTool::new(Arc::clone(&self.client), definition.clone())));
        }
        registry
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct CountingSession {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolProvider for CountingProvider {
        async fn open(&self) -> anyhow::Result<Box<dyn ToolSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl ToolSession for CountingSession {
        fn registry(&self) -> ToolRegistry {
            ToolRegistry::new()
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn closes_after_success() {
        let provider = CountingProvider::default();
        let value = with_tool_session(&provider, |tools| async move { Ok(tools.len()) })
            .await
            .unwrap();
        assert_eq!(value, 0);
        assert_eq!(provider.opened.load(Ordering::SeqCst), 1);
        assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closes_after_failure() {
        let provider = CountingProvider::default();
        let result: anyhow::Result<()> =
            with_tool_session(&provider, |_tools| async move { Err(anyhow::anyhow!("agent exploded")) }).await;
        assert_eq!(result.unwrap_err().to_string(), "agent exploded");
        assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
    }
}
