//! Live terminal output of a run's events.

use std::io::{Write, stdout};

use color_print::cprintln;

use crate::runner::EventSink;
use crate::trace::{AgentEvent, TraceEvent, truncate};

/// Longest command shown in a tool-use line.
const MAX_COMMAND: usize = 60;

/// Longest tool result shown in detail mode.
const MAX_RESULT: usize = 500;

/// Prints events to stdout as they arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    /// Also show tool inputs and results.
    detail: bool,
}

impl ConsoleSink {
    pub fn new(detail: bool) -> Self {
        Self { detail }
    }
}

impl EventSink for ConsoleSink {
    fn observe(&self, event: &TraceEvent) {
        match &event.event {
            AgentEvent::System { session_id, model, .. } => {
                if let Some(session_id) = session_id {
                    cprintln!("<dim>Session: {}</dim>", session_id);
                }
                if let Some(model) = model {
                    cprintln!("<dim>Model: {}</dim>", model);
                }
            }
            AgentEvent::AssistantMessage { text } => {
                println!("{text}");
                let _ = stdout().flush();
            }
            AgentEvent::UserMessage { text } => {
                if self.detail {
                    cprintln!("<dim>[user] {}</dim>", text);
                }
            }
            AgentEvent::ToolUse { name, input, .. } => {
                match tool_summary(name, input) {
                    Some(summary) => cprintln!("<dim>[{}: {}]</dim>", name, summary),
                    None => cprintln!("<dim>[{}]</dim>", name),
                }
                if self.detail
                    && let Ok(pretty) = serde_json::to_string_pretty(input)
                {
                    cprintln!("<dim>{}</dim>", pretty);
                }
            }
            AgentEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                if !self.detail {
                    return;
                }
                if *is_error {
                    cprintln!("<red>[Result {} failed]</red>", tool_use_id);
                } else {
                    cprintln!("<dim>[Result {}]</dim>", tool_use_id);
                }
                cprintln!("<dim>{}</dim>", truncate(content, MAX_RESULT));
            }
            AgentEvent::RunSummary(summary) => {
                println!();
                if summary.is_error {
                    cprintln!("<red>Run ended with an error: {}</red>", summary.subtype);
                }
                cprintln!("<dim>Duration: {:.1}s</dim>", summary.duration_seconds);
                if let Some(cost) = summary.cost_usd {
                    cprintln!("<dim>Cost: ${:.4}</dim>", cost);
                }
                if let Some(turns) = summary.num_turns {
                    cprintln!("<dim>Turns: {}</dim>", turns);
                }
            }
        }
    }
}

/// Extract a short summary for known tool types.
fn tool_summary(name: &str, input: &serde_json::Value) -> Option<String> {
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());
    match name {
        "Read" | "Write" | "Edit" => field("file_path").map(str::to_string),
        "Bash" => {
            let cmd = field("command")?;
            Some(format!("`{}`", shorten(cmd, MAX_COMMAND)))
        }
        "Glob" => field("pattern").map(str::to_string),
        "Grep" => field("pattern").map(|p| format!("/{p}/")),
        "WebFetch" => field("url").map(str::to_string),
        "WebSearch" => field("query").map(|q| format!("\"{q}\"")),
        "Task" => field("description").map(str::to_string),
        _ => None,
    }
}

/// Cut text to at most `limit` characters, marking the cut with an ellipsis.
fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept = text.chars().take(limit.saturating_sub(3)).collect::<String>();
    format!("{kept}...")
}
