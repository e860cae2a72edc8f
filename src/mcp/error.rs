use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server returned error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("MCP server closed the connection")]
    Closed,
}

pub type McpResult<T> = Result<T, McpError>;
