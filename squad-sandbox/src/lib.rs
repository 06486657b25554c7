//! SQUAD Sandbox - Shared Sandbox Orchestration
//!
//! One remote sandbox hosts every agent process of a session. The
//! orchestrator creates it lazily on first registration, uploads and runs
//! the agent-runtime bundle once, launches per-agent processes, streams
//! their output, and owns pause/resume/kill for the whole sandbox.
//!
//! Task text never enters a command line: agent identity travels through
//! UUID/enum-shaped argv and the task body only through the `AGENT_TASK`
//! environment variable.

pub mod bundle;
mod provider;

pub use provider::{
    ExecOptions, ExecOutcome, HttpSandboxProvider, MockSandboxProvider, SandboxProvider,
    StreamSink,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use squad_core::{
    AgentError, AgentId, AgentSandboxStatus, AgentType, SandboxError, SandboxMetadata,
    SandboxResources, SandboxState, Specialization, SquadResult,
};
use squad_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Estimated sandbox cost per runtime second (2 vCPU class).
const COST_PER_SECOND: f64 = 0.000_028;

/// Which stream a chunk of agent output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Handler receiving streamed agent output chunk-wise:
/// `(agent_id, stream, data)`.
pub type OutputHandler = Arc<dyn Fn(&AgentId, OutputStream, &str) + Send + Sync>;

/// In-memory status of one agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Registered, no process started yet
    Registered,
    /// Process running in the sandbox
    Running,
    /// Exited with code 0
    Completed,
    /// Exited non-zero
    Error,
    /// Terminated by kill
    Killed,
}

/// One registered agent as tracked by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProcess {
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    pub status: ProcessStatus,
    pub started_at: Option<DateTime<Utc>>,
}

/// Snapshot served by `GET /api/sandbox/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxStatusSummary {
    pub sandbox_id: Option<String>,
    pub is_ready: bool,
    pub agent_count: usize,
    pub agents: Vec<AgentProcess>,
}

/// One-shot command result, with `error` set for non-zero exits. Timeouts
/// never reach this type; they surface as `SandboxError::CommandTimeout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub error: bool,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Resource envelope for the shared sandbox
    pub resources: SandboxResources,
    /// Where the install script fetches the `squad-agent` binary
    pub agent_binary_url: String,
    /// Environment passed to every agent process
    /// (`MONGODB_URI`, `MONGODB_DB_NAME`, `ANTHROPIC_API_KEY`)
    pub runtime_env: HashMap<String, String>,
}

impl OrchestratorConfig {
    /// Build from the control plane's environment.
    pub fn from_env() -> Self {
        let mut runtime_env = HashMap::new();
        for key in ["MONGODB_URI", "MONGODB_DB_NAME", "ANTHROPIC_API_KEY"] {
            if let Ok(value) = std::env::var(key) {
                runtime_env.insert(key.to_string(), value);
            }
        }
        Self {
            resources: SandboxResources::default(),
            agent_binary_url: std::env::var("SQUAD_AGENT_BINARY_URL")
                .unwrap_or_else(|_| "https://get.squad.run/squad-agent".to_string()),
            runtime_env,
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Default)]
struct OrchestratorState {
    sandbox_id: Option<String>,
    setup_done: bool,
    agents: HashMap<AgentId, AgentProcess>,
    created_at: Option<DateTime<Utc>>,
}

/// Owner of the single shared sandbox and the agent process registry.
/// Process-wide singleton; create once and share via `Arc`.
pub struct SandboxOrchestrator {
    provider: Arc<dyn SandboxProvider>,
    store: Store,
    config: OrchestratorConfig,
    output: Option<OutputHandler>,
    state: Mutex<OrchestratorState>,
}

impl SandboxOrchestrator {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        store: Store,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            output: None,
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    /// Attach the chunk-wise output handler (wired to the event bus by the
    /// control plane).
    pub fn with_output_handler(mut self, handler: OutputHandler) -> Self {
        self.output = Some(handler);
        self
    }

    /// The shared sandbox id, if one exists.
    pub async fn sandbox_id(&self) -> Option<String> {
        self.state.lock().await.sandbox_id.clone()
    }

    /// Register an agent with the orchestrator, lazily creating and setting
    /// up the shared sandbox on first use. Idempotent per agent.
    pub async fn register(
        &self,
        agent_id: AgentId,
        agent_type: AgentType,
        specialization: Option<Specialization>,
    ) -> SquadResult<String> {
        let mut state = self.state.lock().await;

        let sandbox_id = match &state.sandbox_id {
            Some(id) => id.clone(),
            None => {
                let id = self.provider.create_sandbox(&self.config.resources).await?;
                info!(sandbox_id = %id, "Shared sandbox created");
                state.sandbox_id = Some(id.clone());
                state.created_at = Some(Utc::now());
                id
            }
        };

        if !state.setup_done {
            for file in bundle::runtime_bundle(&self.config.agent_binary_url) {
                self.provider
                    .write_file(&sandbox_id, file.path, &file.contents)
                    .await?;
            }
            let setup = self
                .provider
                .exec(&sandbox_id, &bundle::setup_command(), ExecOptions::default())
                .await?;
            if setup.exit_code != 0 {
                return Err(SandboxError::CreationFailed {
                    reason: format!("runtime setup failed: {}", setup.stderr),
                }
                .into());
            }
            state.setup_done = true;
            info!(sandbox_id = %sandbox_id, "Runtime bundle installed");
        }

        if !state.agents.contains_key(&agent_id) {
            state.agents.insert(
                agent_id,
                AgentProcess {
                    agent_id,
                    agent_type,
                    specialization,
                    status: ProcessStatus::Registered,
                    started_at: None,
                },
            );

            self.store
                .sandboxes()
                .track(
                    &sandbox_id,
                    &agent_id,
                    SandboxState::Active,
                    SandboxMetadata {
                        agent_type,
                        specialization,
                        created_by: Some("orchestrator".to_string()),
                    },
                    self.config.resources,
                )
                .await?;
            self.store
                .agents()
                .set_sandbox(&agent_id, Some(&sandbox_id), AgentSandboxStatus::Active)
                .await?;
        }

        Ok(sandbox_id)
    }

    /// Launch an agent process and wait for it to exit, streaming stdout and
    /// stderr chunk-wise to the output handler. At most one process per
    /// agent may run at a time.
    pub async fn run_agent(
        &self,
        agent_id: AgentId,
        task: &str,
        parent_id: Option<AgentId>,
    ) -> SquadResult<ExecOutcome> {
        let (sandbox_id, command) = {
            let mut state = self.state.lock().await;
            let sandbox_id = state
                .sandbox_id
                .clone()
                .ok_or(SandboxError::NotReady)?;
            let process = state
                .agents
                .get_mut(&agent_id)
                .ok_or_else(|| AgentError::NotRegistered {
                    agent_id: agent_id.to_string(),
                })?;
            if process.status == ProcessStatus::Running {
                return Err(AgentError::AlreadyRunning {
                    agent_id: agent_id.to_string(),
                }
                .into());
            }
            let command = agent_command(
                agent_id,
                process.agent_type,
                process.specialization,
                parent_id,
            );
            process.status = ProcessStatus::Running;
            process.started_at = Some(Utc::now());
            (sandbox_id, command)
        };

        let mut env = self.config.runtime_env.clone();
        env.insert("AGENT_TASK".to_string(), task.to_string());

        let options = ExecOptions {
            cwd: Some(bundle::RUNTIME_DIR.to_string()),
            env,
            timeout_ms: Some(self.config.resources.timeout_ms),
            on_stdout: self.stream_sink(agent_id, OutputStream::Stdout),
            on_stderr: self.stream_sink(agent_id, OutputStream::Stderr),
        };

        debug!(agent_id = %agent_id, "Launching agent process");
        let result = self.provider.exec(&sandbox_id, &command, options).await;

        let mut state = self.state.lock().await;
        if let Some(process) = state.agents.get_mut(&agent_id) {
            // A concurrent kill wins over the natural exit status.
            if process.status == ProcessStatus::Running {
                process.status = match &result {
                    Ok(outcome) if outcome.exit_code == 0 => ProcessStatus::Completed,
                    Ok(_) => ProcessStatus::Error,
                    Err(_) => ProcessStatus::Error,
                };
            }
        }
        drop(state);

        self.store.sandboxes().heartbeat(&sandbox_id).await.ok();
        result
    }

    /// Run a one-shot command in the shared sandbox, streaming output.
    /// Non-zero exits come back as `error: true`; timeouts surface as
    /// `SandboxError::CommandTimeout`.
    pub async fn execute(
        &self,
        agent_id: AgentId,
        command: &str,
        options: ExecOptions,
    ) -> SquadResult<ExecResult> {
        let sandbox_id = self
            .sandbox_id()
            .await
            .ok_or(SandboxError::NotReady)?;

        let ExecOptions {
            cwd,
            env,
            timeout_ms,
            on_stdout,
            on_stderr,
        } = options;
        let options = ExecOptions {
            cwd,
            env,
            timeout_ms,
            on_stdout: on_stdout.or_else(|| self.stream_sink(agent_id, OutputStream::Stdout)),
            on_stderr: on_stderr.or_else(|| self.stream_sink(agent_id, OutputStream::Stderr)),
        };

        let outcome = self.provider.exec(&sandbox_id, command, options).await?;
        Ok(ExecResult {
            error: outcome.exit_code != 0,
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        })
    }

    /// Mark an agent's process killed and best-effort terminate it inside
    /// the sandbox by matching the agent id on its command line. The
    /// sandbox itself stays alive for its peers.
    pub async fn kill(&self, agent_id: AgentId) -> SquadResult<()> {
        let sandbox_id = {
            let mut state = self.state.lock().await;
            let sandbox_id = state.sandbox_id.clone();
            let process = state
                .agents
                .get_mut(&agent_id)
                .ok_or_else(|| AgentError::NotRegistered {
                    agent_id: agent_id.to_string(),
                })?;
            process.status = ProcessStatus::Killed;
            sandbox_id
        };

        if let Some(sandbox_id) = &sandbox_id {
            // Agent ids are UUID-shaped, so the pattern is shell-safe.
            let pattern = format!("pkill -f {agent_id} || true");
            if let Err(e) = self
                .provider
                .exec(sandbox_id, &pattern, ExecOptions::default())
                .await
            {
                warn!(agent_id = %agent_id, error = %e, "Best-effort process kill failed");
            }
            self.store
                .agents()
                .set_sandbox(&agent_id, Some(sandbox_id), AgentSandboxStatus::Killed)
                .await?;
        }

        info!(agent_id = %agent_id, "Agent process killed");
        Ok(())
    }

    /// Pause the entire shared sandbox on behalf of one agent. Every
    /// agent's sandbox status moves to paused together.
    pub async fn pause(&self, agent_id: AgentId) -> SquadResult<()> {
        let sandbox_id = self.require_registered(agent_id).await?;
        self.pause_sandbox(&sandbox_id).await
    }

    /// Resume the shared sandbox after a pause, on behalf of one agent.
    pub async fn resume(&self, agent_id: AgentId) -> SquadResult<()> {
        let sandbox_id = self.require_registered(agent_id).await?;
        self.resume_sandbox(&sandbox_id).await
    }

    /// Pause the shared sandbox by id. Fails when `sandbox_id` is not the
    /// live shared sandbox.
    pub async fn pause_sandbox(&self, sandbox_id: &str) -> SquadResult<()> {
        self.require_current(sandbox_id).await?;
        self.provider.pause(sandbox_id).await?;
        self.store.sandboxes().mark_paused(sandbox_id).await?;
        self.store
            .agents()
            .set_sandbox_status_all(sandbox_id, AgentSandboxStatus::Paused)
            .await?;
        info!(sandbox_id, "Sandbox paused");
        Ok(())
    }

    /// Resume the shared sandbox by id.
    pub async fn resume_sandbox(&self, sandbox_id: &str) -> SquadResult<()> {
        self.require_current(sandbox_id).await?;
        self.provider.resume(sandbox_id).await?;
        self.store.sandboxes().mark_resumed(sandbox_id).await?;
        self.store
            .agents()
            .set_sandbox_status_all(sandbox_id, AgentSandboxStatus::Active)
            .await?;
        info!(sandbox_id, "Sandbox resumed");
        Ok(())
    }

    async fn require_current(&self, sandbox_id: &str) -> SquadResult<()> {
        match self.sandbox_id().await {
            Some(current) if current == sandbox_id => Ok(()),
            _ => Err(SandboxError::NotFound {
                sandbox_id: sandbox_id.to_string(),
            }
            .into()),
        }
    }

    /// Tear down the shared sandbox: every attached agent is marked killed,
    /// all sandbox records transition to killed with costs recorded, the
    /// remote sandbox is destroyed, and the in-memory state is released.
    pub async fn kill_sandbox(&self) -> SquadResult<()> {
        let (sandbox_id, agents, created_at) = {
            let mut state = self.state.lock().await;
            let sandbox_id = match state.sandbox_id.take() {
                Some(id) => id,
                None => return Ok(()),
            };
            for process in state.agents.values_mut() {
                process.status = ProcessStatus::Killed;
            }
            let agents: Vec<AgentId> = state.agents.keys().copied().collect();
            let created_at = state.created_at.take();
            state.setup_done = false;
            state.agents.clear();
            (sandbox_id, agents, created_at)
        };

        let runtime_seconds = created_at
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        for agent_id in &agents {
            self.store
                .sandboxes()
                .record_costs(
                    &sandbox_id,
                    agent_id,
                    runtime_seconds,
                    runtime_seconds * COST_PER_SECOND,
                )
                .await
                .ok();
        }

        self.store.sandboxes().mark_killed(&sandbox_id).await?;
        self.store
            .agents()
            .set_sandbox_status_all(&sandbox_id, AgentSandboxStatus::Killed)
            .await?;
        self.provider.kill(&sandbox_id).await?;

        info!(sandbox_id = %sandbox_id, agents = agents.len(), "Sandbox killed");
        Ok(())
    }

    /// Whether the sandbox exists and its runtime is installed.
    pub async fn is_ready(&self) -> bool {
        let state = self.state.lock().await;
        state.sandbox_id.is_some() && state.setup_done
    }

    /// Whether an agent currently has a running process.
    pub async fn is_running(&self, agent_id: &AgentId) -> bool {
        let state = self.state.lock().await;
        state
            .agents
            .get(agent_id)
            .map(|p| p.status == ProcessStatus::Running)
            .unwrap_or(false)
    }

    /// Status snapshot for the REST surface.
    pub async fn status(&self) -> SandboxStatusSummary {
        let state = self.state.lock().await;
        SandboxStatusSummary {
            sandbox_id: state.sandbox_id.clone(),
            is_ready: state.sandbox_id.is_some() && state.setup_done,
            agent_count: state.agents.len(),
            agents: state.agents.values().cloned().collect(),
        }
    }

    async fn require_registered(&self, agent_id: AgentId) -> SquadResult<String> {
        let state = self.state.lock().await;
        if !state.agents.contains_key(&agent_id) {
            return Err(AgentError::NotRegistered {
                agent_id: agent_id.to_string(),
            }
            .into());
        }
        state.sandbox_id.clone().ok_or_else(|| {
            SandboxError::NotReady.into()
        })
    }

    fn stream_sink(&self, agent_id: AgentId, stream: OutputStream) -> Option<StreamSink> {
        self.output.as_ref().map(|handler| {
            let handler = handler.clone();
            let sink: StreamSink = Arc::new(move |chunk: &str| {
                handler(&agent_id, stream, chunk);
            });
            sink
        })
    }
}

/// Compose the runtime command line for one agent. Only UUID-shaped ids and
/// enum tokens are interpolated; the task body travels via `AGENT_TASK`.
pub fn agent_command(
    agent_id: AgentId,
    agent_type: AgentType,
    specialization: Option<Specialization>,
    parent_id: Option<AgentId>,
) -> String {
    let mut command = format!(
        "{} --agentId {} --agentType {}",
        bundle::RUNTIME_BIN,
        agent_id,
        agent_type.as_db_str()
    );
    if let Some(specialization) = specialization {
        command.push_str(&format!(" --specialization {}", specialization.as_db_str()));
    }
    if let Some(parent_id) = parent_id {
        command.push_str(&format!(" --parentId {parent_id}"));
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use squad_core::EntityIdType;

    #[test]
    fn test_agent_command_shape() {
        let agent_id = AgentId::new_v4();
        let parent_id = AgentId::new_v4();
        let command = agent_command(
            agent_id,
            AgentType::Specialist,
            Some(Specialization::Researcher),
            Some(parent_id),
        );

        assert!(command.starts_with(bundle::RUNTIME_BIN));
        assert!(command.contains(&format!("--agentId {agent_id}")));
        assert!(command.contains("--agentType specialist"));
        assert!(command.contains("--specialization researcher"));
        assert!(command.contains(&format!("--parentId {parent_id}")));
    }

    #[test]
    fn test_agent_command_omits_absent_flags() {
        let command = agent_command(AgentId::new_v4(), AgentType::Director, None, None);
        assert!(!command.contains("--specialization"));
        assert!(!command.contains("--parentId"));
    }

    #[test]
    fn test_agent_command_never_carries_free_text() {
        // Every interpolated token is a UUID or an enum literal; no shell
        // metacharacters can appear.
        let command = agent_command(
            AgentId::new_v4(),
            AgentType::Specialist,
            Some(Specialization::General),
            None,
        );
        assert!(command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '/' | '.')));
    }

    #[test]
    fn test_output_stream_names() {
        assert_eq!(OutputStream::Stdout.as_str(), "stdout");
        assert_eq!(OutputStream::Stderr.as_str(), "stderr");
    }
}
