//! The judging capability: turns a rendered analysis prompt into a structured
//! verdict.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use derive_more::{Display, Error};
use regex::Regex;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::analysis::Score;
use crate::credential::Credential;

#[derive(Debug, Display, Error)]
pub enum AnalysisError {
    /// The judging capability could not produce a response.
    #[display("judge failed: {message}")]
    Judge { message: String },

    /// The response contained no structured block.
    #[display("judge response contains no structured block")]
    MissingBlock,

    /// The structured block does not match the expected fields.
    #[display("judge response has the wrong shape: {message}")]
    Shape { message: String },
}

impl AnalysisError {
    pub fn judge(message: impl Into<String>) -> Self {
        AnalysisError::Judge {
            message: message.into(),
        }
    }
}

/// Produces a free-form response to an analysis prompt.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, prompt: &str) -> Result<String, AnalysisError>;
}

#[async_trait]
impl<F> Judge for F
where
    F: Fn(&str) -> Result<String, AnalysisError> + Send + Sync,
{
    async fn judge(&self, prompt: &str) -> Result<String, AnalysisError> {
        self(prompt)
    }
}

/// The fields a judge is expected to return.
///
/// Every field is required. `claimed_success`, `discrepancy` and `turn_count`
/// are checked for shape but the analysis takes them from the run instead.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub actual_success: bool,
    pub claimed_success: bool,
    pub discrepancy: bool,
    pub turn_count: usize,
    pub cli_friction_points: Vec<String>,
    pub help_used: bool,
    pub help_useful: bool,
    pub ax_improvements: Vec<String>,
    pub ax_score: Score,
    pub ax_summary: String,
}

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*?)```").expect("compile fenced block regex")
});

/// Parse a judge response into a [`Verdict`].
///
/// The structured block is the first fenced block in the response, or the
/// whole response if it has none.
pub fn parse_response(response: &str) -> Result<Verdict, AnalysisError> {
    let (block, fenced) = match FENCED_BLOCK.captures(response) {
        Some(caps) => (caps.get(1).map_or("", |m| m.as_str()), true),
        None => (response, false),
    };

    let value = match serde_json::from_str::<serde_json::Value>(block.trim()) {
        Ok(value) => value,
        Err(_) if !fenced => return Err(AnalysisError::MissingBlock),
        Err(e) => {
            return Err(AnalysisError::Shape {
                message: format!("invalid JSON: {e}"),
            });
        }
    };

    serde_json::from_value(value).map_err(|e| AnalysisError::Shape { message: e.to_string() })
}

/// Judges with a single-turn Claude Code invocation.
#[derive(Debug, Clone, Builder)]
pub struct ClaudeJudge {
    #[builder(into, default = "claude")]
    binary: String,

    #[builder(into)]
    model: Option<String>,

    #[builder(default)]
    credential: Credential,

    #[builder(default = Duration::from_secs(300))]
    timeout: Duration,
}

impl Default for ClaudeJudge {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The JSON envelope of `claude --output-format json`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    is_error: bool,

    #[serde(default)]
    subtype: Option<String>,

    result: Option<String>,
}

impl ClaudeJudge {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p");
        cmd.args(["--output-format", "json"]);
        cmd.args(["--max-turns", "1"]);
        if let Some(model) = &self.model {
            cmd.args(["--model", model]);
        }
        self.credential.apply(&mut cmd);

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, prompt: &str) -> Result<String, AnalysisError> {
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| AnalysisError::judge(format!("spawn `{}`: {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AnalysisError::judge(format!("write prompt: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AnalysisError::judge(format!("wait for `{}`: {e}", self.binary)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!("exited with {}: {}", output.status, stderr.trim());
            return Err(AnalysisError::judge(message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(%stdout, "judge output");
        let envelope = serde_json::from_str::<Envelope>(stdout.trim())
            .map_err(|e| AnalysisError::judge(format!("parse judge output: {e}")))?;
        if envelope.is_error {
            let subtype = envelope.subtype.as_deref().unwrap_or("error");
            return Err(AnalysisError::judge(format!("judge run reported `{subtype}`")));
        }
        envelope.result.ok_or_else(|| AnalysisError::judge("judge output has no result"))
    }
}

#[async_trait]
impl Judge for ClaudeJudge {
    #[tracing::instrument(skip_all, fields(binary = %self.binary))]
    async fn judge(&self, prompt: &str) -> Result<String, AnalysisError> {
        debug!(prompt_len = prompt.len(), "asking judge");
        tokio::time::timeout(self.timeout, self.run(prompt))
            .await
            .map_err(|_| {
                AnalysisError::judge(format!("timed out after {}s", self.timeout.as_secs_f64()))
            })?
    }
}
