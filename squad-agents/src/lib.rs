//! SQUAD Agents - Director and Specialist Runtimes
//!
//! Both modes share the same scaffolding: connect to the store, resolve the
//! durable session, inject resume context, mark `working`, run, mark
//! `completed` or `error`, exit. The director decomposes and aggregates;
//! a specialist executes one assigned task. Results are emitted between
//! sentinel lines on stdout and extracted host-side.

pub mod director;
pub mod extract;
pub mod prompts;
pub mod runner;
pub mod specialist;

pub use director::{
    aggregate_results, parse_decomposition, DirectorConfig, DirectorRuntime, Subtask,
};
pub use extract::{
    extract_output, output_start_marker, DIRECTOR_OUTPUT_START, OUTPUT_END,
    SPECIALIST_OUTPUT_START,
};
pub use runner::{run, RunnerArgs};
pub use specialist::SpecialistRuntime;
