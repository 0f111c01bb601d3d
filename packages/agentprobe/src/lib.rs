//! AgentProbe runs a coding agent against a CLI tool and judges how it went.
//!
//! The pipeline has two independently callable halves:
//!
//! - [`Runner::execute`] drives one scenario through an [`AgentRuntime`],
//!   consuming its events as they arrive and folding them into a
//!   [`RunResult`].
//! - [`Analyzer::analyze`] turns a `RunResult` (fresh or persisted) into an
//!   [`Analysis`], combining a deterministic pattern scan with a structured
//!   judgment from a [`Judge`].

pub mod analysis;
pub mod analyzer;
pub mod claim;
pub mod console;
pub mod credential;
pub mod report;
pub mod result;
pub mod runner;
pub mod runtime;
pub mod scenario;
pub mod template;
pub mod trace;

pub use analysis::{Analysis, Score};
pub use analyzer::{AnalysisError, Analyzer, ClaudeJudge, Judge};
pub use claim::{ClaimDetector, KeywordClaims};
pub use credential::Credential;
pub use report::Report;
pub use result::{ClaimedSuccess, RunError, RunResult};
pub use runner::{CancelHandle, Cancellation, EventSink, ExecuteOptions, Runner};
pub use runtime::{
    AgentRuntime, ClaudeCode, EventStream, ExecutionContext, ExecutionError, RuntimeMessage,
};
pub use scenario::{ScenarioError, Scenarios};
pub use trace::{AgentEvent, EventKind, TraceEvent};
