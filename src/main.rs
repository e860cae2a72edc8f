//! Landing Zone Designer - CLI entry point
//!
//! Runs a single design session and exits.

use std::sync::Arc;

use landing_zone_designer::agent::Agent;
use landing_zone_designer::llm::OpenRouterClient;
use landing_zone_designer::tools::McpToolProvider;
use landing_zone_designer::{Config, SessionOrchestrator};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landing_zone_designer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, output_dir={}",
        config.default_model,
        config.output_dir.display()
    );

    let llm = Arc::new(OpenRouterClient::new(config.api_key.clone(), config.base_url.clone()));
    let agent = Agent::new(llm, config.default_model.clone(), config.max_iterations);
    let tools = McpToolProvider::new(config.mcp_server.clone());

    let summary = SessionOrchestrator::new(&config, Arc::new(agent), Arc::new(tools))
        .run()
        .await?;
    info!(state = ?summary.state, "Session finished");

    Ok(())
}
