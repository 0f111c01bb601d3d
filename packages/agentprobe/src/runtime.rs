//! The agent runtime: something that accepts a task and publishes events.

use std::path::PathBuf;

use async_trait::async_trait;
use derive_more::{Display, Error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::credential::Credential;
use crate::trace::AgentEvent;

pub mod claude;
pub mod stream;

pub use claude::ClaudeCode;

/// Capacity of the channel between a runtime and the runner.
pub const STREAM_CAPACITY: usize = 64;

/// Errors raised before a run produces any events.
#[derive(Debug, Display, Error)]
pub enum ExecutionError {
    /// The agent runtime could not be launched.
    #[display("start agent runtime: {reason}")]
    Startup { reason: String },
}

impl ExecutionError {
    pub fn startup(reason: impl Into<String>) -> Self {
        ExecutionError::Startup {
            reason: reason.into(),
        }
    }
}

/// Everything the runtime needs to know about where and how to run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Name of the CLI tool the task is about.
    pub tool: String,

    /// Directory the agent works in.
    pub working_dir: PathBuf,

    pub credential: Credential,

    pub max_turns: u32,

    pub model: Option<String>,
}

/// A message published by a runtime into an [`EventStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeMessage {
    Event(AgentEvent),

    /// The runtime failed mid-stream. Nothing follows an error.
    Error(String),
}

/// The receiving end of a run's events.
///
/// The stream ends when every sender is dropped. If the stream has a producer
/// task, dropping the stream aborts it.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::Receiver<RuntimeMessage>,
    producer: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Create a stream fed by whoever holds the returned sender.
    pub fn channel(capacity: usize) -> (mpsc::Sender<RuntimeMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        let stream = Self {
            receiver,
            producer: None,
        };
        (sender, stream)
    }

    /// Tie the lifetime of a producer task to this stream.
    pub fn with_producer(mut self, producer: JoinHandle<()>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Wait for the next message; `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<RuntimeMessage> {
        self.receiver.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Launches an agent against a task.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Start the agent; fails only if nothing could be started.
    async fn start(
        &self,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<EventStream, ExecutionError>;
}
