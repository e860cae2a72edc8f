//! One design session, end to end.
//!
//! ```text
//! Idle → ToolsAcquired → AgentInvoked → Extracted → Materialized → Assembled → Persisted
//!                                                                            ↘ PersistFailed
//! ```
//!
//! Nothing loops back and nothing is retried. Failures up to and including the
//! agent call are returned as errors; everything after it degrades instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::agent::{build_system_prompt, AgentInvoker, DESIGN_QUERY};
use crate::artifact::{
    append_saved_location, assemble_report, extract_artifact_path, report_file_name, ArtifactMaterializer,
};
use crate::config::Config;
use crate::tools::{with_tool_session, ToolProvider, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ToolsAcquired,
    AgentInvoked,
    Extracted,
    Materialized,
    Assembled,
    Persisted,
    PersistFailed,
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub state: SessionState,
    /// Set when the report was written.
    pub report_path: Option<PathBuf>,
    pub diagram_path: Option<PathBuf>,
}

pub struct SessionOrchestrator {
    agent: Arc<dyn AgentInvoker>,
    tools: Arc<dyn ToolProvider>,
    materializer: ArtifactMaterializer,
    output_dir: PathBuf,
    query: String,
    agent_timeout: Option<Duration>,
}

impl SessionOrchestrator {
    pub fn new(config: &Config, agent: Arc<dyn AgentInvoker>, tools: Arc<dyn ToolProvider>) -> Self {
        Self {
            agent,
            tools,
            materializer: ArtifactMaterializer::new(),
            output_dir: config.output_dir.clone(),
            query: DESIGN_QUERY.to_string(),
            agent_timeout: config.agent_timeout,
        }
    }

    /// Replace the design query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub async fn run(&self) -> anyhow::Result<SessionSummary> {
        self.run_at(|| Local::now().naive_local()).await
    }

    /// Run the session, taking the report timestamp from `clock` once the
    /// agent has replied.
    pub async fn run_at<C>(&self, clock: C) -> anyhow::Result<SessionSummary>
    where
        C: FnOnce() -> NaiveDateTime,
    {
        let mut state = SessionState::Idle;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {}", self.output_dir.display()))?;

        let state_ref = &mut state;
        let response = with_tool_session(self.tools.as_ref(), |registry| async move {
            advance(state_ref, SessionState::ToolsAcquired);
            if registry.is_empty() {
                warn!("Tool server advertised no tools; the agent cannot draw a diagram");
            } else {
                info!(tools = registry.len(), "Tool session ready");
            }

            let system_prompt = build_system_prompt(&self.output_dir.to_string_lossy(), &registry);
            info!("Sending query to agent: {}", self.query);
            let response = self.invoke_agent(&system_prompt, &registry).await?;
            advance(state_ref, SessionState::AgentInvoked);
            Ok(response)
        })
        .await
        .context("Agent invocation failed")?;

        let candidate = extract_artifact_path(&response);
        advance(&mut state, SessionState::Extracted);
        match &candidate {
            Some(path) => info!("Agent reported diagram at: {}", path),
            None => info!("No diagram path found in agent response"),
        }

        let diagram_path = self
            .materializer
            .materialize(candidate.as_deref(), &self.output_dir)
            .into_artifact();
        advance(&mut state, SessionState::Materialized);

        let generated_at = clock();
        let report_path = self.output_dir.join(report_file_name(generated_at));
        let mut report = assemble_report(&self.query, &response, diagram_path.as_deref(), generated_at);
        append_saved_location(&mut report, &report_path);
        advance(&mut state, SessionState::Assembled);

        let report_path = match std::fs::write(&report_path, report) {
            Ok(()) => {
                advance(&mut state, SessionState::Persisted);
                info!("Design documentation saved to {}", report_path.display());
                if let Some(diagram) = &diagram_path {
                    info!("Diagram file: {}", diagram.display());
                }
                Some(report_path)
            }
            Err(e) => {
                advance(&mut state, SessionState::PersistFailed);
                error!("Error saving report to {}: {}", report_path.display(), e);
                error!("Agent result: {}", response);
                None
            }
        };

        Ok(SessionSummary {
            state,
            report_path,
            diagram_path,
        })
    }

    async fn invoke_agent(&self, system_prompt: &str, registry: &ToolRegistry) -> anyhow::Result<String> {
        let call = self.agent.invoke(system_prompt, &self.query, registry);
        match self.agent_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| anyhow::anyhow!("Agent did not respond within {:?}", limit))?,
            None => call.await,
        }
    }
}

fn advance(state: &mut SessionState, next: SessionState) {
    tracing::debug!(from = ?*state, to = ?next, "Session state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSession;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeAgent {
        reply: anyhow::Result<String>,
        delay: Option<Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeAgent {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(anyhow::anyhow!(message.to_string())),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentInvoker for FakeAgent {
        async fn invoke(&self, system_prompt: &str, _query: &str, _tools: &ToolRegistry) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeTools {
        closed: Arc<AtomicUsize>,
    }

    struct FakeToolSession {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolProvider for FakeTools {
        async fn open(&self) -> anyhow::Result<Box<dyn ToolSession>> {
            Ok(Box::new(FakeToolSession {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl ToolSession for FakeToolSession {
        fn registry(&self) -> ToolRegistry {
            ToolRegistry::new()
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn orchestrator(output_dir: &Path, agent: Arc<FakeAgent>, tools: Arc<FakeTools>) -> SessionOrchestrator {
        let config = Config::new("sk-test".into(), "test-model".into(), output_dir.to_path_buf());
        SessionOrchestrator::new(&config, agent, tools)
    }

    #[tokio::test]
    async fn persists_report_with_copied_diagram() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("scratch");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("wan.png"), b"png").unwrap();
        let output_dir = dir.path().join("outputs");

        let reply = format!("Design...\nThe diagram is saved at: {}\nDone.", src.join("wan.png").display());
        let agent = Arc::new(FakeAgent::replying(&reply));
        let tools = Arc::new(FakeTools::default());

        let summary = orchestrator(&output_dir, agent.clone(), tools.clone())
            .run_at(at)
            .await
            .unwrap();

        assert_eq!(summary.state, SessionState::Persisted);
        assert_eq!(summary.diagram_path, Some(output_dir.join("wan.png")));
        let report_path = summary.report_path.unwrap();
        assert_eq!(report_path, output_dir.join("aws_design_20250601_120000.md"));

        let report = std::fs::read_to_string(&report_path).unwrap();
        assert!(report.contains("![AWS CloudWAN Architecture](wan.png)"));
        assert!(report.contains(&reply));
        assert!(report.contains(&format!("**Documentation saved at:** `{}`", report_path.display())));

        assert_eq!(tools.closed.load(Ordering::SeqCst), 1);
        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The diagram is saved at:"));
    }

    #[tokio::test]
    async fn write_failure_is_absorbed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output_dir = dir.path().join("outputs");
        // A directory squatting on the report name makes the write fail.
        std::fs::create_dir_all(output_dir.join("aws_design_20250601_120000.md")).unwrap();

        let summary = orchestrator(
            &output_dir,
            Arc::new(FakeAgent::replying("no diagram this time")),
            Arc::new(FakeTools::default()),
        )
        .run_at(at)
        .await
        .unwrap();

        assert_eq!(summary.state, SessionState::PersistFailed);
        assert!(summary.report_path.is_none());
        assert!(summary.diagram_path.is_none());
    }

    #[tokio::test]
    async fn agent_failure_propagates_and_releases_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = Arc::new(FakeTools::default());

        let err = orchestrator(dir.path(), Arc::new(FakeAgent::failing("model unavailable")), tools.clone())
            .run_at(at)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("model unavailable"));
        assert_eq!(tools.closed.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn runs_without_tools_when_server_advertises_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let agent = Arc::new(FakeAgent::replying("No diagram could be drawn."));
        let tools = Arc::new(FakeTools::default());

        let summary = orchestrator(dir.path(), agent.clone(), tools.clone())
            .run_at(at)
            .await
            .unwrap();

        assert_eq!(summary.state, SessionState::Persisted);
        assert!(summary.diagram_path.is_none());
        assert!(agent.prompts.lock().unwrap()[0].contains("The diagram is saved at:"));
        assert_eq!(tools.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_deadline_is_enforced_when_configured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let agent = Arc::new(FakeAgent {
            delay: Some(Duration::from_secs(120)),
            ..FakeAgent::replying("late")
        });
        let tools = Arc::new(FakeTools::default());
        let mut config = Config::new("sk-test".into(), "m".into(), dir.path().to_path_buf());
        config.agent_timeout = Some(Duration::from_secs(30));

        let err = SessionOrchestrator::new(&config, agent, tools.clone())
            .run_at(at)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("did not respond within"));
        assert_eq!(tools.closed.load(Ordering::SeqCst), 1);
    }
}
