//! Subcommands, and the arguments they share.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::{Context, Result};

use agentprobe::Report;
use agentprobe::credential::{self, Credential, EnvSnapshot, Origin, Sources};

pub mod analyze;
pub mod scenarios;

/// How a report is printed.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Print a report to stdout.
pub fn print_report(report: &Report<'_>, format: Format) -> Result<()> {
    match format {
        Format::Text => println!("{report}"),
        Format::Markdown => println!("{}", report.markdown()),
        Format::Json => println!("{}", report.json().context("serialize report")?),
    }
    Ok(())
}

/// Where scenario files live.
#[derive(Args, Clone, Debug)]
pub struct ScenarioArgs {
    /// Directory containing `<tool>/<scenario>.txt` files.
    #[arg(long = "scenarios-dir", env = "AGENTPROBE_SCENARIOS", default_value = "scenarios")]
    pub dir: PathBuf,
}

/// Credentials for the agent and the judge.
///
/// Without either flag, the token in `~/.agentprobe/config` is used, then
/// `CLAUDE_CODE_OAUTH_TOKEN`, then `ANTHROPIC_API_KEY`; failing all of those,
/// Claude Code finds credentials on its own.
#[derive(Args, Clone, Debug)]
pub struct AuthArgs {
    /// OAuth token to run Claude Code with.
    #[arg(long, conflicts_with = "oauth_token_file")]
    pub oauth_token: Option<String>,

    /// File whose first line is an OAuth token.
    #[arg(long, conflicts_with = "oauth_token")]
    pub oauth_token_file: Option<PathBuf>,
}

impl AuthArgs {
    pub fn resolve(&self) -> Result<(Credential, Origin)> {
        Sources::builder()
            .maybe_token(self.oauth_token.clone())
            .maybe_token_file(self.oauth_token_file.clone())
            .maybe_config_file(credential::default_config_file())
            .env(EnvSnapshot::capture())
            .build()
            .resolve()
            .context("resolve credentials")
    }
}

/// The Claude Code installation to drive.
#[derive(Args, Clone, Debug)]
pub struct ClaudeArgs {
    /// Claude Code binary.
    #[arg(long = "claude-bin", env = "AGENTPROBE_CLAUDE", default_value = "claude")]
    pub binary: String,

    /// Model for the agent and the judge.
    #[arg(long)]
    pub model: Option<String>,
}
