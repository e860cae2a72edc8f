//! Configuration management for the landing zone designer.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The LLM model to use. Defaults to `anthropic/claude-sonnet-4`.
//! - `OPENROUTER_BASE_URL` - Optional. Chat completions base URL. Defaults to `https://openrouter.ai/api/v1`.
//! - `OUTPUT_DIR` - Optional. Where diagrams and reports are written. Defaults to `./outputs`.
//! - `MCP_SERVER_COMMAND` - Optional. Diagram MCP server executable. Defaults to `uvx`.
//! - `MCP_SERVER_ARGS` - Optional. Whitespace-separated server arguments. Defaults to `awslabs.aws-diagram-mcp-server@latest`.
//! - `MAX_ITERATIONS` - Optional. Maximum tool-call rounds inside the single agent invocation. Defaults to `50`.
//! - `AGENT_TIMEOUT_SECS` - Optional. Deadline for the agent invocation. Unset means wait indefinitely.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OUTPUT_DIR: &str = "./outputs";
pub const DEFAULT_MCP_COMMAND: &str = "uvx";
pub const DEFAULT_MCP_ARGS: &str = "awslabs.aws-diagram-mcp-server@latest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// How to launch the diagram tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Executable to spawn
    pub command: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_MCP_COMMAND.to_string(),
            args: split_args(DEFAULT_MCP_ARGS),
        }
    }
}

/// Designer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Chat completions base URL
    pub base_url: String,

    /// Directory receiving the diagram copy and the report
    pub output_dir: PathBuf,

    /// Diagram tool server launch settings
    pub mcp_server: McpServerConfig,

    /// Maximum tool-call rounds for the agent
    pub max_iterations: usize,

    /// Optional deadline for the agent call
    pub agent_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model = lookup("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup("OPENROUTER_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let output_dir = lookup("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mcp_server = McpServerConfig {
            command: lookup("MCP_SERVER_COMMAND").unwrap_or_else(|| DEFAULT_MCP_COMMAND.to_string()),
            args: lookup("MCP_SERVER_ARGS")
                .map(|v| split_args(&v))
                .unwrap_or_else(|| split_args(DEFAULT_MCP_ARGS)),
        };

        let max_iterations = lookup("MAX_ITERATIONS")
            .unwrap_or_else(|| "50".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e)))?;

        let agent_timeout = lookup("AGENT_TIMEOUT_SECS")
            .map(|v| parse_timeout(&v).map_err(|e| ConfigError::InvalidValue("AGENT_TIMEOUT_SECS".to_string(), e)))
            .transpose()?;

        Ok(Self {
            api_key,
            default_model,
            base_url,
            output_dir,
            mcp_server,
            max_iterations,
            agent_timeout,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, output_dir: PathBuf) -> Self {
        Self {
            api_key,
            default_model,
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir,
            mcp_server: McpServerConfig::default(),
            max_iterations: 50,
            agent_timeout: None,
        }
    }
}

fn split_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e| format!("expected whole seconds, got {:?}: {}", value, e))?;
    if secs == 0 {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}
