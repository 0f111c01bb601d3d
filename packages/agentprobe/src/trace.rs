//! The trace of a single scenario execution.
//!
//! Agent runtimes publish [`AgentEvent`]s; the runner stamps each one with a
//! monotonic sequence number as it arrives, producing a [`TraceEvent`]. The
//! trace of a run is the ordered list of these events.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// One step in the trace, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position of the event within its run, starting at zero.
    pub sequence: u64,

    /// The event itself.
    #[serde(flatten)]
    pub event: AgentEvent,
}

impl TraceEvent {
    /// The kind of the wrapped event.
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// An event published by an agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Runtime bookkeeping, e.g. session initialization.
    System {
        subtype: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// Narrative text written by the agent.
    AssistantMessage { text: String },

    /// The agent invoked a tool.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The output of a tool invocation.
    ToolResult {
        tool_use_id: String,
        content: String,

        #[serde(default)]
        is_error: bool,
    },

    /// Text sent to the agent on behalf of the user.
    UserMessage { text: String },

    /// Terminal summary of the run.
    RunSummary(RunSummary),
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::System { .. } => EventKind::System,
            AgentEvent::AssistantMessage { .. } => EventKind::AssistantMessage,
            AgentEvent::ToolUse { .. } => EventKind::ToolUse,
            AgentEvent::ToolResult { .. } => EventKind::ToolResult,
            AgentEvent::UserMessage { .. } => EventKind::UserMessage,
            AgentEvent::RunSummary(_) => EventKind::RunSummary,
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        AgentEvent::AssistantMessage { text: text.into() }
    }

    /// Create a tool invocation.
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        AgentEvent::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        AgentEvent::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// The shell command of a tool invocation, if the tool received one.
    pub fn command(&self) -> Option<&str> {
        match self {
            AgentEvent::ToolUse { input, .. } => input.get("command")?.as_str(),
            _ => None,
        }
    }
}

/// Discriminant of [`AgentEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[display("system")]
    System,

    #[display("assistant_message")]
    AssistantMessage,

    #[display("tool_use")]
    ToolUse,

    #[display("tool_result")]
    ToolResult,

    #[display("user_message")]
    UserMessage,

    #[display("run_summary")]
    RunSummary,
}

/// Metadata reported by the runtime when a run ends.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Runtime-specific outcome, e.g. `success` or `error_max_turns`.
    pub subtype: String,

    /// Whether the runtime considers the run an error.
    #[serde(default)]
    pub is_error: bool,

    /// Wall-clock duration of the run as measured by the runtime.
    pub duration_seconds: f64,

    /// Total cost, if the runtime reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    /// Number of turns, as counted by the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,

    /// The final text the agent produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Longest tool result rendered in full by [`render_trace`].
pub const MAX_RENDERED_RESULT: usize = 2_000;

/// Render a trace as plain text, one block per event.
///
/// Tool results longer than [`MAX_RENDERED_RESULT`] characters are truncated.
pub fn render_trace(trace: &[TraceEvent]) -> String {
    let mut out = String::new();
    for event in trace {
        let body = match &event.event {
            AgentEvent::System { subtype, model, .. } => match model {
                Some(model) => format!("{subtype} (model: {model})"),
                None => subtype.clone(),
            },
            AgentEvent::AssistantMessage { text } | AgentEvent::UserMessage { text } => {
                text.clone()
            }
            AgentEvent::ToolUse { name, input, .. } => format!("{name} {input}"),
            AgentEvent::ToolResult {
                content, is_error, ..
            } => {
                let content = truncate(content, MAX_RENDERED_RESULT);
                if *is_error {
                    format!("(error) {content}")
                } else {
                    content
                }
            }
            AgentEvent::RunSummary(summary) => {
                let mut line = format!(
                    "{} after {:.1}s",
                    summary.subtype, summary.duration_seconds
                );
                if let Some(result) = &summary.result {
                    line.push_str(": ");
                    line.push_str(result);
                }
                line
            }
        };
        out.push_str(&format!("[{}] {}: {}\n", event.sequence, event.kind(), body.trim_end()));
    }
    out
}

/// Truncate to at most `limit` characters, marking the cut.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!(
            "{}... [truncated {} chars]",
            &text[..cut],
            text[cut..].chars().count()
        ),
        None => text.to_string(),
    }
}
