//! Sentinel stream markers and host-side result extraction.
//!
//! Runtimes wrap their final output in sentinel lines on stdout; the
//! control plane extracts the substring between the first matching pair.

use squad_core::AgentType;

/// Start marker for director output.
pub const DIRECTOR_OUTPUT_START: &str = "=== DIRECTOR OUTPUT ===";

/// Start marker for specialist output.
pub const SPECIALIST_OUTPUT_START: &str = "=== SPECIALIST OUTPUT ===";

/// Shared end marker.
pub const OUTPUT_END: &str = "=== END OUTPUT ===";

/// The start marker for an agent type.
pub fn output_start_marker(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Director => DIRECTOR_OUTPUT_START,
        AgentType::Specialist => SPECIALIST_OUTPUT_START,
    }
}

/// Extract the result from an agent's stdout: the substring between the
/// first sentinel pair for the agent type, or the whole trimmed stream when
/// no pair is present.
pub fn extract_output(agent_type: AgentType, stdout: &str) -> String {
    let start_marker = output_start_marker(agent_type);
    if let Some(start) = stdout.find(start_marker) {
        let after_start = &stdout[start + start_marker.len()..];
        if let Some(end) = after_start.find(OUTPUT_END) {
            return after_start[..end].trim().to_string();
        }
    }
    stdout.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_between_sentinels() {
        let stdout = format!(
            "log line\n{DIRECTOR_OUTPUT_START}\n# Report\n\ncontent\n{OUTPUT_END}\ntrailing"
        );
        assert_eq!(
            extract_output(AgentType::Director, &stdout),
            "# Report\n\ncontent"
        );
    }

    #[test]
    fn test_marker_must_match_agent_type() {
        let stdout =
            format!("{SPECIALIST_OUTPUT_START}\nspecialist text\n{OUTPUT_END}");
        // a director extractor does not match specialist sentinels
        assert_eq!(extract_output(AgentType::Director, &stdout), stdout.trim());
        assert_eq!(
            extract_output(AgentType::Specialist, &stdout),
            "specialist text"
        );
    }

    #[test]
    fn test_missing_sentinels_falls_back_to_whole_stream() {
        let stdout = "  just some output  \n";
        assert_eq!(
            extract_output(AgentType::Specialist, stdout),
            "just some output"
        );
    }

    #[test]
    fn test_missing_end_marker_falls_back() {
        let stdout = format!("{DIRECTOR_OUTPUT_START}\nunterminated");
        assert_eq!(extract_output(AgentType::Director, &stdout), stdout.trim());
    }

    #[test]
    fn test_first_pair_wins() {
        let stdout = format!(
            "{SPECIALIST_OUTPUT_START}\nfirst\n{OUTPUT_END}\n{SPECIALIST_OUTPUT_START}\nsecond\n{OUTPUT_END}"
        );
        assert_eq!(extract_output(AgentType::Specialist, &stdout), "first");
    }
}
