//! Presenting a run and its analysis.

use std::fmt::{self, Display, Formatter, Write as _};

use color_print::cformat;
use serde::Serialize;

use crate::analysis::Analysis;
use crate::result::RunResult;

/// A run paired with its analysis.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Report<'a> {
    pub run: &'a RunResult,
    pub analysis: &'a Analysis,
}

impl<'a> Report<'a> {
    pub fn new(run: &'a RunResult, analysis: &'a Analysis) -> Self {
        Self { run, analysis }
    }

    fn status(&self) -> String {
        match &self.run.error {
            Some(error) => format!("FAILED ({}: {error})", error.kind()),
            None if self.analysis.actual_success() => "SUCCESS".to_string(),
            None => "FAILED".to_string(),
        }
    }

    fn score(&self) -> String {
        self.analysis
            .score()
            .map_or_else(|| "n/a".to_string(), |score| score.to_string())
    }

    /// Render as a Markdown document.
    pub fn markdown(&self) -> String {
        let run = self.run;
        let analysis = self.analysis;
        let mut out = String::new();

        let _ = writeln!(out, "# AgentProbe: {} / {}", run.tool, run.scenario);
        let _ = writeln!(out);
        let _ = writeln!(out, "| | |");
        let _ = writeln!(out, "|---|---|");
        let _ = writeln!(out, "| Status | {} |", self.status());
        let _ = writeln!(out, "| Duration | {:.1}s |", run.duration_seconds);
        let _ = writeln!(out, "| Cost | ${:.3} |", run.cost_usd);
        let _ = writeln!(out, "| Turns | {} |", analysis.turn_count());
        let _ = writeln!(out, "| Claimed success | {} |", run.claimed_success);
        let _ = writeln!(out, "| Actual success | {} |", analysis.actual_success());
        let _ = writeln!(out, "| Discrepancy | {} |", analysis.discrepancy());
        let _ = writeln!(out, "| Help used | {} |", analysis.help_used());
        let _ = writeln!(out, "| Score | {} |", self.score());

        if !analysis.summary().is_empty() {
            let _ = writeln!(out, "\n## Summary\n\n{}", analysis.summary());
        }
        for (title, items) in [
            ("Friction points", analysis.friction_points()),
            ("Improvements", analysis.improvements()),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {title}\n");
            for item in items {
                let _ = writeln!(out, "- {item}");
            }
        }
        out
    }

    /// Render as pretty-printed JSON.
    pub fn json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let run = self.run;
        let analysis = self.analysis;

        writeln!(f, "{}", cformat!("<blue><bold>AgentProbe Results</bold></blue>"))?;
        writeln!(
            f,
            "{}",
            cformat!("<bold>Tool:</bold> {} | <bold>Scenario:</bold> {}", run.tool, run.scenario)
        )?;
        let status = if run.is_failed() || !analysis.actual_success() {
            cformat!("<red>{}</red>", self.status())
        } else {
            cformat!("<green>{}</green>", self.status())
        };
        let stats = [
            cformat!("<bold>Status:</bold> {}", status),
            cformat!("<bold>Duration:</bold> {:.1}s", run.duration_seconds),
            cformat!("<bold>Cost:</bold> ${:.3}", run.cost_usd),
            cformat!("<bold>Turns:</bold> {}", analysis.turn_count()),
        ];
        writeln!(f, "{}", stats.join(" | "))?;
        let discrepancy = if analysis.discrepancy() {
            cformat!(" | <yellow><bold>Discrepancy</bold></yellow>")
        } else {
            String::new()
        };
        writeln!(
            f,
            "{}",
            cformat!(
                "<bold>Claimed:</bold> {} | <bold>Actual:</bold> {}{} | <bold>Score:</bold> {}",
                run.claimed_success,
                analysis.actual_success(),
                discrepancy,
                self.score()
            )
        )?;

        if !analysis.summary().is_empty() {
            writeln!(f, "\n{}\n{}", cformat!("<bold>Summary:</bold>"), analysis.summary())?;
        }
        for (title, items) in [
            ("Friction points", analysis.friction_points()),
            ("Improvements", analysis.improvements()),
        ] {
            if items.is_empty() {
                continue;
            }
            writeln!(f, "\n{}", cformat!("<bold>{}:</bold>", title))?;
            for item in items {
                writeln!(f, "• {item}")?;
            }
        }
        if !analysis.is_judged() {
            writeln!(f, "\n{}", cformat!("<dim>Pattern scan only; no judged analysis.</dim>"))?;
        }
        Ok(())
    }
}
