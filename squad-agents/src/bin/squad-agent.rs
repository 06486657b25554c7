//! In-sandbox agent runtime CLI.
//!
//! Identity arrives through UUID/enum-shaped flags; the task body arrives
//! only through the `AGENT_TASK` environment variable. Exit code 0 on
//! success, 1 on fatal error.

use clap::Parser;
use squad_agents::runner::{run, RunnerArgs};
use squad_core::{AgentId, AgentType, Specialization};

#[derive(Debug, Parser)]
#[command(name = "squad-agent", about = "SQUAD agent runtime")]
struct Cli {
    /// Agent identity (UUID)
    #[arg(long = "agentId")]
    agent_id: AgentId,

    /// Agent role
    #[arg(long = "agentType")]
    agent_type: AgentType,

    /// Specialist specialization
    #[arg(long = "specialization")]
    specialization: Option<Specialization>,

    /// Spawning director (UUID), for specialists
    #[arg(long = "parentId")]
    parent_id: Option<AgentId>,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout is reserved for sentinel-wrapped output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let task = match std::env::var("AGENT_TASK") {
        Ok(task) if !task.trim().is_empty() => task,
        _ => {
            eprintln!("AGENT_TASK environment variable is required");
            std::process::exit(1);
        }
    };

    let code = run(RunnerArgs {
        agent_id: cli.agent_id,
        agent_type: cli.agent_type,
        specialization: cli.specialization,
        parent_id: cli.parent_id,
        task,
    })
    .await;

    std::process::exit(code);
}
