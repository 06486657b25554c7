//! Prompt templates for the director and specialist runtimes.

use squad_core::Specialization;

/// System prompt for the decomposition call. The model sees only the user
/// task and must answer with a single JSON object.
pub const DECOMPOSE_SYSTEM_PROMPT: &str = "\
You are a director agent coordinating a team of specialists. Decompose the \
user's task into 2-4 focused subtasks, each suited to one specialist.

Respond with JSON only, no prose, in exactly this shape:
{\"subtasks\": [{\"title\": \"...\", \"description\": \"...\", \"specialization\": \"researcher|writer|analyst|general\"}]}";

/// System prompt for the executive-summary call.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a director agent. You delegated a task to specialists and collected \
their results. Write a concise executive summary of the combined results, \
addressed to the person who submitted the task.";

/// User message for the executive-summary call.
pub fn summary_request(task: &str, aggregated: &str) -> String {
    format!("Original task:\n{task}\n\nSpecialist results:\n\n{aggregated}")
}

/// System prompt for a specialist of a given specialization, with the
/// rendered resume context (if any) injected verbatim.
pub fn specialist_system_prompt(
    specialization: Specialization,
    resume_context: Option<&str>,
) -> String {
    let role = match specialization {
        Specialization::Researcher => {
            "You are a research specialist. Gather the relevant facts and sources \
             and present them clearly."
        }
        Specialization::Writer => {
            "You are a writing specialist. Produce polished prose that covers the \
             task completely."
        }
        Specialization::Analyst => {
            "You are an analysis specialist. Evaluate the material critically and \
             draw out the implications."
        }
        Specialization::General => {
            "You are a capable generalist. Complete the task thoroughly and \
             report your findings."
        }
    };

    match resume_context {
        Some(context) => format!("{role}\n\n{context}"),
        None => role.to_string(),
    }
}

/// System prompt for the host-side director agentic loop, with resume
/// context injected verbatim.
pub fn director_system_prompt(resume_context: Option<&str>) -> String {
    let base = "\
You are a director agent. Break the user's task into subtasks, spawn a \
specialist for each (spawnSpecialist), create and assign one task per \
specialist (createTask, assignTask), then watch progress (getTaskStatus, \
checkInbox, readMessage) and record checkpoints as you go. When every \
subtask is finished, combine the results and answer with the final report.";

    match resume_context {
        Some(context) => format!("{base}\n\n{context}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_prompt_demands_json() {
        assert!(DECOMPOSE_SYSTEM_PROMPT.contains("JSON only"));
        assert!(DECOMPOSE_SYSTEM_PROMPT.contains("subtasks"));
    }

    #[test]
    fn test_specialist_prompt_injects_resume() {
        let prompt = specialist_system_prompt(
            Specialization::Writer,
            Some("## Resuming from checkpoint\nGoal: finish"),
        );
        assert!(prompt.contains("writing specialist"));
        assert!(prompt.ends_with("Goal: finish"));
    }
}
