//! Newline-delimited JSON-RPC transport over a child process's stdio.

use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{McpError, McpResult};
use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::config::McpServerConfig;

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Grace period for the server to exit on its own after stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct StdioTransport {
    child: Mutex<Option<Child>>,
    /// `None` once the transport has been closed.
    writer: Mutex<Option<BoxedWriter>>,
    reader: Mutex<BoxedReader>,
    request_id: AtomicI64,
}

impl StdioTransport {
    /// Spawn the server process and wire its stdin/stdout to the transport.
    ///
    /// The child is killed if the transport is dropped without [`close`](Self::close).
    pub fn spawn(config: &McpServerConfig) -> McpResult<Self> {
        info!(command = %config.command, args = ?config.args, "Starting MCP server");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout was not captured".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        Ok(Self::from_parts(Some(child), stdout, stdin))
    }

    /// Build a transport over arbitrary byte streams (no child process).
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_parts(None, reader, writer)
    }

    fn from_parts<R, W>(child: Option<Child>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        Self {
            child: Mutex::new(child),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(BufReader::new(reader)),
            request_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send(&self, message: &JsonRpcRequest) -> McpResult<()> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| McpError::Protocol(format!("Failed to serialize request: {e}")))?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a request and wait for the response carrying the same id.
    ///
    /// Server notifications, server-initiated requests and non-JSON lines
    /// arriving in the meantime are skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id();
        let mut request = JsonRpcRequest::new(method, params);
        request.id = Some(id);

        // Hold the reader for the whole exchange so responses pair with requests.
        let mut reader = self.reader.lock().await;
        self.send(&request).await?;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(McpError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, line = trimmed, "Ignoring non-JSON-RPC line from MCP server");
                    continue;
                }
            };

            if message.method.is_some() || message.id != Some(id) {
                debug!(method = ?message.method, id = ?message.id, "Skipping unrelated MCP message");
                continue;
            }

            if let Some(error) = message.error {
                return Err(McpError::Server {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(message.result.unwrap_or(Value::Null));
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.send(&JsonRpcRequest::new(method, params)).await
    }

    /// Close stdin and reap the child, killing it if it does not exit promptly.
    pub async fn close(&self) -> McpResult<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Failed to shut down MCP stdin cleanly: {}", e);
            }
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                warn!("MCP server did not exit within {:?}, killing it", SHUTDOWN_GRACE);
                child.kill().await?;
                Ok(())
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "mcp_server", "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, DuplexStream};

    /// Echo server: answers every request with its method name, interleaving
    /// a notification and a garbage line before each response.
    fn spawn_echo_server(server_in: DuplexStream, mut server_out: DuplexStream) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let Some(id) = request.get("id").cloned() else {
                    continue;
                };
                let reply = if request["method"] == "fail" {
                    json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "no such method"}})
                } else {
                    json!({"jsonrpc": "2.0", "id": id, "result": {"echo": request["method"]}})
                };
                let frames = format!(
                    "{}\nstarting up...\n{}\n",
                    json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}),
                    reply
                );
                server_out.write_all(frames.as_bytes()).await.unwrap();
            }
        });
    }

    fn connected_transport() -> StdioTransport {
        let (client_out, server_in) = duplex(8192);
        let (server_out, client_in) = duplex(8192);
        spawn_echo_server(server_in, server_out);
        StdioTransport::from_streams(client_in, client_out)
    }

    #[tokio::test]
    async fn request_skips_notifications_and_noise() {
        let transport = connected_transport();
        let first = transport.request("tools/list", None).await.unwrap();
        let second = transport.request("initialize", Some(json!({}))).await.unwrap();
        assert_eq!(first["echo"], "tools/list");
        assert_eq!(second["echo"], "initialize");
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let transport = connected_transport();
        let err = transport.request("fail", None).await.unwrap_err();
        assert!(matches!(err, McpError::Server { code: -32601, .. }));
    }

    #[tokio::test]
    async fn eof_reports_closed() {
        let (client_out, _server_in) = duplex(1024);
        let (server_out, client_in) = duplex(1024);
        drop(server_out);
        let transport = StdioTransport::from_streams(client_in, client_out);
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::Closed));
    }

    #[tokio::test]
    async fn closed_transport_rejects_sends() {
        let transport = connected_transport();
        transport.close().await.unwrap();
        assert!(!transport.is_connected().await);
        let err = transport.notify("notifications/initialized", None).await.unwrap_err();
        assert!(matches!(err, McpError::Closed));
    }
}
