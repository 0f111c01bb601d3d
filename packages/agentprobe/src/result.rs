//! The reduction of a scenario execution's event stream.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::trace::{EventKind, TraceEvent};

/// The outcome of one scenario execution.
///
/// Built by the runner while it folds the event stream; once returned it is
/// never modified, and may be persisted and analyzed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// The CLI tool under test.
    pub tool: String,

    /// Identifier of the scenario that was run.
    pub scenario: String,

    /// What the agent said about its own success.
    pub claimed_success: ClaimedSuccess,

    /// Number of `assistant_message` events in the trace.
    pub turn_count: usize,

    pub duration_seconds: f64,

    /// Zero when the runtime does not report cost.
    pub cost_usd: f64,

    pub trace: Vec<TraceEvent>,

    /// Present only when the run ended abnormally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RunResult {
    /// Whether the run ended abnormally.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Iterate over trace events of the given kind.
    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &TraceEvent> {
        self.trace.iter().filter(move |event| event.kind() == kind)
    }
}

/// The agent's own assertion about whether it succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimedSuccess {
    #[display("true")]
    Succeeded,

    #[display("false")]
    Failed,

    /// The agent never stated an outcome.
    #[default]
    #[display("unknown")]
    Unknown,
}

impl ClaimedSuccess {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            ClaimedSuccess::Succeeded => Some(true),
            ClaimedSuccess::Failed => Some(false),
            ClaimedSuccess::Unknown => None,
        }
    }

    /// Collapse to a boolean; an unknown claim is not a claim of success.
    pub fn normalized(self) -> bool {
        self.as_bool().unwrap_or(false)
    }

    pub fn is_known(self) -> bool {
        self != ClaimedSuccess::Unknown
    }
}

/// Why a run ended abnormally.
#[derive(Debug, Clone, PartialEq, Display, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunError {
    /// The event stream did not terminate within the configured bound.
    #[display("timed out after {seconds}s")]
    Timeout { seconds: f64 },

    /// The run was cancelled by the caller.
    #[display("cancelled")]
    Cancelled,

    /// The runtime signalled an error mid-stream.
    #[display("stream error: {message}")]
    Stream { message: String },

    /// The stream closed without a run summary.
    #[display("stream ended without a run summary")]
    Incomplete,
}

impl RunError {
    /// Short name of the error kind, for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Timeout { .. } => "timeout",
            RunError::Cancelled => "cancelled",
            RunError::Stream { .. } => "stream",
            RunError::Incomplete => "incomplete",
        }
    }
}
