//! Instruction layering.

use taskforce_config::PromptPattern;

/// Guidance for a root agent that delegates through subagents.
pub const ORCHESTRATOR_GUIDANCE: &str = "\
You coordinate a team of subagents. Break the task into independent pieces, \
start a subagent for each with spawn_agent, and collect results with wait. \
Use send_input to follow up with a subagent and resume_agent to run queued \
input. Close every subagent with close_agent once its result is in.";

/// Guidance for a spawned worker agent.
pub const WORKER_GUIDANCE: &str = "\
You are a subagent working on one piece of a larger task. Stay within the \
scope you were given and finish with a concise report of what you found or \
changed.";

/// Build the instructions for an agent at `depth`.
///
/// Segments are joined by a blank line in this order: orchestrator guidance
/// (root only), caller instructions, worker guidance (children only), spawn
/// instructions. Blank segments are skipped; `None` when nothing remains.
pub fn build_instructions(
    depth: u32,
    pattern: PromptPattern,
    caller: Option<&str>,
    spawn: Option<&str>,
) -> Option<String> {
    let structured = pattern == PromptPattern::Orchestrator;
    let segments = [
        (structured && depth == 0).then_some(ORCHESTRATOR_GUIDANCE),
        caller,
        (structured && depth > 0).then_some(WORKER_GUIDANCE),
        spawn,
    ];

    let joined = segments
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    (!joined.is_empty()).then_some(joined)
}
