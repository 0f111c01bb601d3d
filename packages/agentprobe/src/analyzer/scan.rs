//! Deterministic friction detection over a trace.
//!
//! Pure and fast; needs nothing beyond the trace itself.

use std::collections::HashMap;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use crate::result::{ClaimedSuccess, RunResult};
use crate::trace::{AgentEvent, TraceEvent};

/// Consecutive identical invocations at which a retry loop is reported.
pub const RETRY_THRESHOLD: usize = 3;

/// More error-like results than this earns an error-message recommendation.
const ERROR_RECOMMENDATION_THRESHOLD: usize = 2;

/// Longest excerpt of a failing result quoted in a friction point.
const MAX_EXCERPT: usize = 120;

static ERROR_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?imx)
        \bexit\ (?:code|status)\ [1-9][0-9]*\b
        | \bexited\ with\ (?:code\ )?[1-9][0-9]*\b
        | ^\s*(?:error|fatal)\b:?
        | \bcommand\ not\ found\b
        | \bpermission\ denied\b
        | \bunknown\ (?:command|flag|option|subcommand)\b
        | \b(?:invalid|unrecognized)\ (?:argument|option|flag)\b
        | \bno\ such\ file\ or\ directory\b",
    )
    .expect("compile error output regex")
});

/// What the pattern scan found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scan {
    /// Whether the agent asked any tool for help or usage text.
    pub help_used: bool,

    /// Observed friction, in trace order.
    pub friction_points: Vec<String>,

    /// Suggested improvements derived from the patterns found.
    pub recommendations: Vec<String>,

    /// Number of tool invocations.
    pub tool_invocations: usize,

    /// Number of tool invocations with a distinct tool and input.
    pub distinct_invocations: usize,

    /// Number of tool results that look like errors.
    pub error_results: usize,

    /// Number of runs of identical consecutive invocations.
    pub retry_loops: usize,
}

impl Scan {
    /// One-line description of the counts.
    pub fn describe(&self) -> String {
        format!(
            "{} tool invocations ({} distinct), {} error results, {} retry loops, help {}",
            self.tool_invocations,
            self.distinct_invocations,
            self.error_results,
            self.retry_loops,
            if self.help_used { "used" } else { "not used" },
        )
    }
}

/// A tool invocation found in the trace.
struct Invocation<'a> {
    name: &'a str,
    input: &'a serde_json::Value,
    command: Option<&'a str>,
}

impl Invocation<'_> {
    /// How the invocation is quoted in friction points.
    fn label(&self) -> String {
        match self.command {
            Some(command) => format!("`{}`", command.trim()),
            None => format!("{} {}", self.name, self.input),
        }
    }
}

/// Scan a finished run for friction.
pub fn scan(result: &RunResult) -> Scan {
    let invocations = result
        .trace
        .iter()
        .filter_map(|event| match &event.event {
            AgentEvent::ToolUse { id, name, input } => Some((
                id.as_str(),
                Invocation {
                    name,
                    input,
                    command: event.event.command(),
                },
            )),
            _ => None,
        })
        .collect::<Vec<_>>();

    let mut scan = Scan {
        tool_invocations: invocations.len(),
        distinct_invocations: invocations
            .iter()
            .map(|(_, invocation)| (invocation.name, invocation.input.to_string()))
            .unique()
            .count(),
        help_used: invocations
            .iter()
            .filter_map(|(_, invocation)| invocation.command)
            .any(|command| is_help_command(command, &result.tool)),
        ..Scan::default()
    };

    for (invocation, count) in retry_loops(&invocations) {
        scan.retry_loops += 1;
        scan.friction_points
            .push(format!("retried {} {count} times in a row", invocation.label()));
    }

    let by_id = invocations
        .iter()
        .map(|(id, invocation)| (*id, invocation))
        .collect::<HashMap<_, _>>();
    for (tool_use_id, content) in error_results(&result.trace) {
        scan.error_results += 1;
        let quoted = excerpt(content);
        let point = match by_id.get(tool_use_id) {
            Some(invocation) => format!("{} failed: {quoted}", invocation.label()),
            None => format!("tool call failed: {quoted}"),
        };
        scan.friction_points.push(point);
    }

    scan.friction_points = scan.friction_points.into_iter().unique().collect();
    scan.recommendations = recommendations(&scan, result);
    scan
}

/// Runs of at least [`RETRY_THRESHOLD`] identical consecutive invocations.
fn retry_loops<'a, 'b>(
    invocations: &'b [(&'a str, Invocation<'a>)],
) -> Vec<(&'b Invocation<'a>, usize)> {
    invocations
        .iter()
        .chunk_by(|(_, invocation)| (invocation.name, invocation.input))
        .into_iter()
        .filter_map(|(_, group)| {
            let mut group = group.map(|(_, invocation)| invocation);
            let first = group.next()?;
            let count = 1 + group.count();
            (count >= RETRY_THRESHOLD).then_some((first, count))
        })
        .collect()
}

/// Tool results flagged as errors or containing error vocabulary.
fn error_results(trace: &[TraceEvent]) -> impl Iterator<Item = (&str, &str)> {
    trace.iter().filter_map(|event| match &event.event {
        AgentEvent::ToolResult {
            tool_use_id,
            content,
            is_error,
        } if *is_error || ERROR_OUTPUT.is_match(content) => {
            Some((tool_use_id.as_str(), content.as_str()))
        }
        _ => None,
    })
}

/// Whether a shell command asks for help or usage text.
///
/// Matches `--help` and `-help` flags, a `help` subcommand, and `man` pages,
/// in any segment of a compound command. `-h` only counts for `tool`, since
/// elsewhere it often means something else (`df -h`).
pub fn is_help_command(command: &str, tool: &str) -> bool {
    let words = shell_words::split(command)
        .unwrap_or_else(|_| command.split_whitespace().map(str::to_string).collect());

    words
        .split(|word| matches!(word.as_str(), "&&" | "||" | ";" | "|"))
        .any(|segment| {
            let Some((program, args)) = segment.split_first() else {
                return false;
            };
            let is_tool = program.rsplit('/').next() == Some(tool);
            program == "man"
                || args.first().is_some_and(|arg| arg == "help")
                || args.iter().any(|arg| matches!(arg.as_str(), "--help" | "-help"))
                || (is_tool && args.iter().any(|arg| arg == "-h"))
        })
}

fn excerpt(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(no output)");
    if line.chars().count() <= MAX_EXCERPT {
        return line.to_string();
    }
    format!("{}...", line.chars().take(MAX_EXCERPT).collect::<String>())
}

fn recommendations(scan: &Scan, result: &RunResult) -> Vec<String> {
    let unsuccessful = result.is_failed() || result.claimed_success != ClaimedSuccess::Succeeded;

    let mut recommendations = Vec::new();
    if scan.error_results > ERROR_RECOMMENDATION_THRESHOLD {
        recommendations.push(
            "Improve error messages so they say what went wrong and how to fix it".to_string(),
        );
    }
    if !scan.help_used && unsuccessful {
        recommendations.push("Make help and usage text easier to discover".to_string());
    }
    if scan.retry_loops > 0 {
        recommendations.push(
            "Make failures distinguishable so agents stop retrying the same command".to_string(),
        );
    }
    recommendations
}
