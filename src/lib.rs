//! # Landing Zone Designer
//!
//! Runs one AWS architecture design session with an LLM agent that can call
//! a diagram MCP server, then turns the agent's free-text reply into durable
//! artifacts in the output directory.
//!
//! ## Architecture
//!
//! A session runs exactly once:
//! 1. Start the diagram MCP server and expose its tools to the agent
//! 2. Invoke the agent once with the fixed system prompt and design query
//! 3. Extract the diagram path from the reply and copy the diagram into the output directory
//! 4. Render a Markdown report and write it next to the diagram
//!
//! ## Example
//!
//! ```rust,ignore
//! use landing_zone_designer::{config::Config, session::SessionOrchestrator};
//!
//! let config = Config::from_env()?;
//! let orchestrator = SessionOrchestrator::new(&config, agent, tools);
//! let summary = orchestrator.run().await?;
//! println!("{:?}", summary.report_path);
//! ```

pub mod agent;
pub mod artifact;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod session;
pub mod tools;

pub use config::Config;
pub use session::{SessionOrchestrator, SessionState, SessionSummary};
