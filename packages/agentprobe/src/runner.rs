//! Drives one scenario execution and folds its event stream into a
//! [`RunResult`].
//!
//! The runner consumes events one at a time as the runtime publishes them,
//! mirroring each to an optional [`EventSink`] before folding it. A run ends
//! when the runtime publishes a run summary, closes the stream, or signals an
//! error; or when the timeout or cancellation fires. In every case after a
//! successful start the caller gets a `RunResult` back, with
//! [`RunResult::error`] set if the run ended abnormally.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::claim::{ClaimDetector, KeywordClaims};
use crate::credential::Credential;
use crate::result::{ClaimedSuccess, RunError, RunResult};
use crate::runtime::{AgentRuntime, ExecutionContext, ExecutionError, RuntimeMessage};
use crate::trace::{AgentEvent, TraceEvent};

/// Default bound on how long a run may take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default maximum number of agent turns.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Receives every event of a run, in arrival order.
///
/// Called inline by the runner, so implementations must return promptly.
pub trait EventSink: Send + Sync {
    fn observe(&self, event: &TraceEvent);
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<TraceEvent>);

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TraceEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self(sender), receiver)
    }
}

impl EventSink for ChannelSink {
    fn observe(&self, event: &TraceEvent) {
        // A closed receiver just means nobody is watching anymore.
        let _ = self.0.send(event.clone());
    }
}

/// Requests cancellation of the runs holding the paired [`Cancellation`].
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
    pub fn new() -> (CancelHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (CancelHandle(Arc::new(sender)), Self(receiver))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested; never, if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        let closed = self.0.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-call execution options.
#[derive(Builder)]
pub struct ExecuteOptions {
    /// Identifier recorded on the result.
    #[builder(into, default = "ad-hoc")]
    scenario: String,

    /// Directory the agent works in.
    #[builder(into)]
    working_dir: PathBuf,

    #[builder(default)]
    credential: Credential,

    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,

    #[builder(default = DEFAULT_MAX_TURNS)]
    max_turns: u32,

    #[builder(into)]
    model: Option<String>,

    /// Mirror of every event, e.g. for verbose console output.
    sink: Option<Arc<dyn EventSink>>,

    cancellation: Option<Cancellation>,
}

/// Executes scenarios against an [`AgentRuntime`].
pub struct Runner<R> {
    runtime: R,
    claims: Arc<dyn ClaimDetector>,
}

impl<R: AgentRuntime> Runner<R> {
    /// Create a runner that detects claims with [`KeywordClaims`].
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            claims: Arc::new(KeywordClaims),
        }
    }

    /// Replace the claim detection strategy.
    pub fn with_claims(self, claims: impl ClaimDetector + 'static) -> Self {
        Self {
            claims: Arc::new(claims),
            ..self
        }
    }

    /// Execute a scenario.
    ///
    /// Only a failure to start the runtime is returned as an error; anything
    /// that goes wrong afterwards is recorded on the returned result.
    #[tracing::instrument(skip_all, fields(tool = %tool, scenario = %options.scenario))]
    pub async fn execute(
        &self,
        tool: &str,
        scenario_text: &str,
        options: ExecuteOptions,
    ) -> Result<RunResult, ExecutionError> {
        let ExecuteOptions {
            scenario,
            working_dir,
            credential,
            timeout,
            max_turns,
            model,
            sink,
            mut cancellation,
        } = options;

        let context = ExecutionContext {
            tool: tool.to_string(),
            working_dir,
            credential,
            max_turns,
            model,
        };

        let started = Instant::now();
        let mut stream = self.runtime.start(scenario_text, &context).await?;
        let mut fold = Fold::new(tool, &scenario, self.claims.as_ref());

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let abnormal = loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancellation) => {
                    warn!("run cancelled");
                    break Some(RunError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!(?timeout, "run timed out");
                    break Some(RunError::Timeout {
                        seconds: timeout.as_secs_f64(),
                    });
                }
                message = stream.next() => match message {
                    Some(RuntimeMessage::Event(event)) => {
                        let event = fold.stamp(event);
                        if let Some(sink) = &sink {
                            sink.observe(&event);
                        }
                        fold.push(event);
                        if fold.summarized {
                            break None;
                        }
                    }
                    Some(RuntimeMessage::Error(message)) => {
                        warn!(%message, "runtime reported an error");
                        break Some(RunError::Stream { message });
                    }
                    None => break Some(RunError::Incomplete),
                },
            }
        };

        drop(stream);
        let result = fold.finish(abnormal, started.elapsed());
        info!(
            turns = result.turn_count,
            claimed = %result.claimed_success,
            error = ?result.error,
            "run finished"
        );
        Ok(result)
    }
}

async fn cancelled(cancellation: &mut Option<Cancellation>) {
    match cancellation {
        Some(cancellation) => cancellation.cancelled().await,
        None => std::future::pending().await,
    }
}

/// The mutable state of a run in progress.
struct Fold<'a> {
    claims: &'a dyn ClaimDetector,
    tool: String,
    scenario: String,
    trace: Vec<TraceEvent>,
    message_claim: ClaimedSuccess,
    summary_claim: ClaimedSuccess,
    turn_count: usize,
    duration_seconds: f64,
    cost_usd: f64,
    summarized: bool,
    reported_error: Option<RunError>,
}

impl<'a> Fold<'a> {
    fn new(tool: &str, scenario: &str, claims: &'a dyn ClaimDetector) -> Self {
        Self {
            claims,
            tool: tool.to_string(),
            scenario: scenario.to_string(),
            trace: Vec::new(),
            message_claim: ClaimedSuccess::Unknown,
            summary_claim: ClaimedSuccess::Unknown,
            turn_count: 0,
            duration_seconds: 0.0,
            cost_usd: 0.0,
            summarized: false,
            reported_error: None,
        }
    }

    /// Give an event the next sequence number.
    fn stamp(&self, event: AgentEvent) -> TraceEvent {
        TraceEvent {
            sequence: self.trace.len() as u64,
            event,
        }
    }

    /// Fold a stamped event and append it to the trace.
    fn push(&mut self, event: TraceEvent) {
        match &event.event {
            AgentEvent::AssistantMessage { text } => {
                self.turn_count += 1;
                let claim = self.claims.detect(text);
                if claim.is_known() {
                    self.message_claim = claim;
                }
            }
            AgentEvent::RunSummary(summary) => {
                self.summarized = true;
                self.duration_seconds += summary.duration_seconds.max(0.0);
                self.cost_usd += summary.cost_usd.unwrap_or(0.0).max(0.0);
                if let Some(result) = &summary.result {
                    let claim = self.claims.detect(result);
                    if claim.is_known() {
                        self.summary_claim = claim;
                    }
                }
                if summary.is_error {
                    self.reported_error = Some(RunError::Stream {
                        message: format!("agent runtime reported `{}`", summary.subtype),
                    });
                }
            }
            _ => {}
        }

        debug!(sequence = event.sequence, kind = %event.event.kind(), "event");
        self.trace.push(event);
    }

    /// The agent's closing claim: the run summary's, else the latest one made
    /// in a message.
    fn claimed_success(&self) -> ClaimedSuccess {
        if self.summary_claim.is_known() {
            self.summary_claim
        } else {
            self.message_claim
        }
    }

    fn finish(self, abnormal: Option<RunError>, elapsed: Duration) -> RunResult {
        let duration_seconds = if self.summarized {
            self.duration_seconds
        } else {
            elapsed.as_secs_f64()
        };

        RunResult {
            claimed_success: self.claimed_success(),
            tool: self.tool,
            scenario: self.scenario,
            turn_count: self.turn_count,
            duration_seconds,
            cost_usd: self.cost_usd,
            trace: self.trace,
            error: abnormal.or(self.reported_error),
        }
    }
}
