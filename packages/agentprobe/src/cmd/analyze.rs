//! Analyze a previously saved run.

use std::fs::read_to_string;
use std::path::PathBuf;

use clap::Args;
use color_eyre::{
    Section,
    eyre::{Context, Result},
};
use tracing::instrument;

use agentprobe::analyzer::{self, Analyzer, ClaudeJudge};
use agentprobe::{Report, RunResult, Scenarios};

use super::{AuthArgs, ClaudeArgs, Format, ScenarioArgs, print_report};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Run saved with `agentprobe test --output`.
    pub run: PathBuf,

    /// Scenario text given to the agent; loaded from the scenarios directory
    /// if omitted.
    #[arg(long)]
    pub scenario_text: Option<String>,

    /// Skip the judge and analyze with the pattern scan only.
    #[arg(long)]
    pub no_judge: bool,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t)]
    pub format: Format,

    #[command(flatten)]
    pub scenarios: ScenarioArgs,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub claude: ClaudeArgs,
}

#[instrument(skip_all, fields(run = ?config.run))]
pub async fn main(config: Config) -> Result<()> {
    let content = read_to_string(&config.run)
        .with_context(|| format!("read run file: {:?}", config.run))?;
    let result = serde_json::from_str::<RunResult>(&content)
        .with_context(|| format!("parse run file: {:?}", config.run))
        .with_suggestion(|| "Run files are written by `agentprobe test --output <file>`.")?;

    let scenario_text = match config.scenario_text {
        Some(text) => text,
        None => Scenarios::new(&config.scenarios.dir)
            .load(&result.tool, &result.scenario)
            .context("load scenario for run")
            .with_suggestion(|| {
                "Pass the scenario with `--scenario-text` if it is not in the scenarios directory."
            })?,
    };

    let analysis = if config.no_judge {
        analyzer::deterministic(&result, "judge disabled with --no-judge")
    } else {
        let (credential, _) = config.auth.resolve()?;
        let judge = ClaudeJudge::builder()
            .binary(config.claude.binary)
            .maybe_model(config.claude.model)
            .credential(credential)
            .build();
        Analyzer::new(judge).analyze(&result, &scenario_text).await
    };

    print_report(&Report::new(&result, &analysis), config.format)
}
