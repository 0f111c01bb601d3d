//! Turns a finished [`RunResult`] into an [`Analysis`].
//!
//! Analysis runs in two stages. The [pattern scan](scan) always runs and
//! needs nothing external. The [judgment](judge) stage renders the analysis
//! prompt, asks a [`Judge`], and parses the verdict; if that fails, the
//! analysis falls back to what the scan found.

use itertools::Itertools;
use tracing::{info, warn};

use crate::analysis::{Analysis, AnalysisParts, Basis};
use crate::result::RunResult;
use crate::template::{self, ANALYSIS_TEMPLATE, Vars};
use crate::trace::{EventKind, render_trace};

pub mod judge;
pub mod scan;

pub use judge::{AnalysisError, ClaudeJudge, Judge, Verdict, parse_response};
pub use scan::{Scan, scan};

/// Analyzes runs with a judge.
pub struct Analyzer<J> {
    judge: J,
    template: String,
}

impl<J: Judge> Analyzer<J> {
    /// Create an analyzer using the default analysis prompt.
    pub fn new(judge: J) -> Self {
        Self {
            judge,
            template: ANALYSIS_TEMPLATE.to_string(),
        }
    }

    /// Replace the analysis prompt template.
    pub fn with_template(self, template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..self
        }
    }

    /// Render the prompt sent to the judge for a run.
    pub fn prompt(&self, result: &RunResult, scenario_text: &str) -> String {
        let vars = Vars::from([
            ("scenario_text".to_string(), scenario_text.to_string()),
            ("tool_name".to_string(), result.tool.clone()),
            ("trace_text".to_string(), render_trace(&result.trace)),
            ("claimed_success".to_string(), result.claimed_success.to_string()),
        ]);
        template::render(&self.template, &vars)
    }

    /// Analyze a run, falling back to the pattern scan if judgment fails.
    #[tracing::instrument(skip_all, fields(tool = %result.tool, scenario = %result.scenario))]
    pub async fn analyze(&self, result: &RunResult, scenario_text: &str) -> Analysis {
        let scan = scan(result);
        match self.judge_with(result, scenario_text, &scan).await {
            Ok(analysis) => analysis,
            Err(error) => {
                warn!(%error, "judgment failed, using pattern scan only");
                fallback(result, &scan, error.to_string())
            }
        }
    }

    /// Analyze a run, returning the judgment error instead of falling back.
    pub async fn try_analyze(
        &self,
        result: &RunResult,
        scenario_text: &str,
    ) -> Result<Analysis, AnalysisError> {
        self.judge_with(result, scenario_text, &scan(result)).await
    }

    async fn judge_with(
        &self,
        result: &RunResult,
        scenario_text: &str,
        scan: &Scan,
    ) -> Result<Analysis, AnalysisError> {
        let prompt = self.prompt(result, scenario_text);
        let response = self.judge.judge(&prompt).await?;
        let verdict = parse_response(&response)?;
        info!(score = %verdict.ax_score, actual = verdict.actual_success, "judged run");
        Ok(combine(result, scan, verdict))
    }
}

/// Analyze a run with the pattern scan alone.
pub fn deterministic(result: &RunResult, reason: impl Into<String>) -> Analysis {
    fallback(result, &scan(result), reason.into())
}

/// Number of narrative agent messages in the trace.
fn turn_count(result: &RunResult) -> usize {
    result.events_of(EventKind::AssistantMessage).count()
}

fn combine(result: &RunResult, scan: &Scan, verdict: Verdict) -> Analysis {
    let help_used = scan.help_used || verdict.help_used;
    AnalysisParts {
        // A run that ended abnormally did not succeed, whatever the judge says.
        actual_success: verdict.actual_success && !result.is_failed(),
        claimed_success: result.claimed_success.normalized(),
        turn_count: turn_count(result),
        friction_points: scan
            .friction_points
            .iter()
            .cloned()
            .chain(verdict.cli_friction_points)
            .unique()
            .collect(),
        help_used,
        help_useful: help_used && verdict.help_useful,
        improvements: verdict
            .ax_improvements
            .into_iter()
            .chain(scan.recommendations.iter().cloned())
            .unique()
            .collect(),
        score: Some(verdict.ax_score),
        summary: verdict.ax_summary,
        basis: Basis::Judged,
    }
    .into()
}

fn fallback(result: &RunResult, scan: &Scan, reason: String) -> Analysis {
    let actual_success = match (&result.error, result.claimed_success.as_bool()) {
        (None, Some(claimed)) => claimed,
        _ => false,
    };
    let outcome = match &result.error {
        Some(error) => format!("Run failed ({error})"),
        None => format!("Agent claimed success: {}", result.claimed_success),
    };

    AnalysisParts {
        actual_success,
        claimed_success: result.claimed_success.normalized(),
        turn_count: turn_count(result),
        friction_points: scan.friction_points.clone(),
        help_used: scan.help_used,
        help_useful: false,
        improvements: scan.recommendations.clone(),
        score: None,
        summary: format!("{outcome}; {}.", scan.describe()),
        basis: Basis::Deterministic { reason },
    }
    .into()
}
