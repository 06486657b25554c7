//! Shared runner scaffolding for both agent modes.
//!
//! Connect to storage, resolve the durable session, inject resume context,
//! mark `working`, run the mode-specific loop, mark `completed` or `error`,
//! and exit 0/1. Sentinel-wrapped output goes to stdout; logs go to stderr.

use crate::director::{DirectorConfig, DirectorRuntime};
use crate::extract::{output_start_marker, OUTPUT_END};
use crate::specialist::SpecialistRuntime;
use squad_core::{AgentId, AgentStatus, AgentType, Specialization, SquadResult};
use squad_llm::AnthropicProvider;
use squad_store::{Store, StoreConfig};
use std::sync::Arc;
use tracing::{error, info};

/// Everything the runtime needs to execute one agent run.
#[derive(Debug, Clone)]
pub struct RunnerArgs {
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    pub parent_id: Option<AgentId>,
    /// Task body, read from the `AGENT_TASK` environment variable
    pub task: String,
}

/// Run one agent to completion. Returns the process exit code.
pub async fn run(args: RunnerArgs) -> i32 {
    match run_inner(&args).await {
        Ok(()) => 0,
        Err(e) => {
            error!(agent_id = %args.agent_id, error = %e, "Agent run failed");
            1
        }
    }
}

async fn run_inner(args: &RunnerArgs) -> SquadResult<()> {
    let store = Store::connect(&StoreConfig::from_env()).await?;
    let provider = Arc::new(AnthropicProvider::from_env()?);

    let registry = store.agents();
    let session_id = registry.get_or_create_session(&args.agent_id).await?;
    let resume_context = store
        .checkpoints()
        .build_resume_context(&args.agent_id)
        .await?;
    info!(
        agent_id = %args.agent_id,
        session_id = %session_id,
        resuming = resume_context.is_some(),
        "Agent runtime starting"
    );

    registry
        .update_status(&args.agent_id, AgentStatus::Working, None)
        .await?;

    let outcome = match args.agent_type {
        AgentType::Director => {
            DirectorRuntime::new(
                store.clone(),
                provider,
                args.agent_id,
                DirectorConfig::default(),
            )
            .run(&args.task)
            .await
        }
        AgentType::Specialist => {
            SpecialistRuntime::new(
                store.clone(),
                provider,
                args.agent_id,
                args.specialization.unwrap_or_default(),
                args.parent_id,
            )
            .with_resume_context(resume_context)
            .run(&args.task)
            .await
        }
    };

    let result = match outcome {
        Ok(output) => {
            emit_output(args.agent_type, &output);
            let marked = registry
                .update_status(&args.agent_id, AgentStatus::Completed, None)
                .await
                .map(|_| ());
            info!(agent_id = %args.agent_id, "Agent runtime finished");
            marked
        }
        Err(e) => {
            registry
                .update_status(&args.agent_id, AgentStatus::Error, None)
                .await
                .ok();
            Err(e)
        }
    };

    store.disconnect().await;
    result
}

/// Print the sentinel-wrapped result to stdout for the control plane's
/// extractor.
fn emit_output(agent_type: AgentType, output: &str) {
    println!("{}", output_start_marker(agent_type));
    println!("{output}");
    println!("{OUTPUT_END}");
}
