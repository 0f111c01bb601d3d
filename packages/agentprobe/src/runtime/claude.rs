//! Claude Code as an agent runtime, driven as a subprocess.

use std::process::Stdio;

use async_trait::async_trait;
use bon::Builder;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc::Sender;
use tracing::{debug, trace, warn};

use super::stream::OutputMessage;
use super::{
    AgentRuntime, EventStream, ExecutionContext, ExecutionError, RuntimeMessage, STREAM_CAPACITY,
};
use crate::trace::AgentEvent;

/// Most stderr kept for error reports.
const MAX_STDERR: usize = 4_096;

/// Runs scenarios through the `claude` CLI in stream-json mode.
#[derive(Debug, Clone, Builder)]
pub struct ClaudeCode {
    /// The binary to invoke.
    #[builder(into, default = "claude")]
    binary: String,

    /// Passed through as `--permission-mode`.
    #[builder(into)]
    permission_mode: Option<String>,
}

impl Default for ClaudeCode {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClaudeCode {
    fn command(&self, task: &str, context: &ExecutionContext) -> Command {
        let mut cmd = Command::new(&self.binary);

        // Non-interactive, streaming JSON output (requires --verbose)
        cmd.arg("-p").arg(task);
        cmd.args(["--output-format", "stream-json"]);
        cmd.arg("--verbose");
        cmd.args(["--max-turns", &context.max_turns.to_string()]);
        cmd.args(["--append-system-prompt", &tool_context(&context.tool)]);

        if let Some(model) = &context.model {
            cmd.args(["--model", model]);
        }
        if let Some(mode) = &self.permission_mode {
            cmd.args(["--permission-mode", mode]);
        }

        cmd.current_dir(&context.working_dir);
        context.credential.apply(&mut cmd);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Context given to the agent alongside the task.
fn tool_context(tool: &str) -> String {
    format!(
        "You are being evaluated on how well you can use the `{tool}` command-line tool. \
         Use the tool directly from the shell to complete the task, and finish by stating \
         clearly whether you completed it."
    )
}

#[async_trait]
impl AgentRuntime for ClaudeCode {
    #[tracing::instrument(skip(self, task), fields(binary = %self.binary))]
    async fn start(
        &self,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<EventStream, ExecutionError> {
        if !context.working_dir.is_dir() {
            return Err(ExecutionError::startup(format!(
                "working directory does not exist: {}",
                context.working_dir.display()
            )));
        }

        let mut cmd = self.command(task, context);
        debug!(?cmd, "spawning claude process");

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutionError::startup(format!("spawn `{}`: {e}", self.binary)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::startup("capture claude stdout"))?;
        let stderr = child.stderr.take();

        let (sender, stream) = EventStream::channel(STREAM_CAPACITY);
        let producer = tokio::spawn(pump(child, stdout, stderr, sender));
        Ok(stream.with_producer(producer))
    }
}

/// Forward parsed stdout lines into the channel until the process finishes.
///
/// The child is owned here, so aborting this task kills the process.
async fn pump(
    mut child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    sender: Sender<RuntimeMessage>,
) {
    let stderr = stderr.map(|stderr| tokio::spawn(collect_stderr(stderr)));
    let mut lines = BufReader::new(stdout).lines();
    let mut summarized = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                let message = format!("read claude stdout: {e}");
                let _ = sender.send(RuntimeMessage::Error(message)).await;
                return;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!(%line, "received message from claude");

        let message = match serde_json::from_str::<OutputMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                let _ = sender
                    .send(RuntimeMessage::Error(format!("parse stream-json line: {e}: {line}")))
                    .await;
                return;
            }
        };

        for event in message.into_events() {
            summarized |= matches!(event, AgentEvent::RunSummary(_));
            if sender.send(RuntimeMessage::Event(event)).await.is_err() {
                debug!("runner dropped the stream");
                return;
            }
        }
    }

    debug!("claude process closed stdout");
    let status = child.wait().await;
    let stderr = match stderr {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    match status {
        Ok(status) if status.success() || summarized => {}
        Ok(status) => {
            warn!(%status, "claude exited without a result");
            let message = format!("claude exited with {status}: {}", stderr.trim());
            let _ = sender.send(RuntimeMessage::Error(message)).await;
        }
        Err(e) => {
            let _ = sender.send(RuntimeMessage::Error(format!("wait for claude: {e}"))).await;
        }
    }
}

/// Drain stderr so the child never blocks on it, keeping the tail.
async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    let _ = stderr.read_to_end(&mut buf).await;
    let tail = buf.len().saturating_sub(MAX_STDERR);
    String::from_utf8_lossy(&buf[tail..]).into_owned()
}
