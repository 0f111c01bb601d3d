//! Structured judgment of a finished run.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Ordinal usability grade, `A` best and `F` worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Score {
    A,
    B,
    C,
    D,
    F,
}

/// How an [`Analysis`] was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum Basis {
    /// Pattern scan plus a parsed judgment.
    Judged,

    /// Pattern scan only; the judgment stage failed or was skipped.
    Deterministic { reason: String },
}

/// The fields of an [`Analysis`] that are set directly.
///
/// `discrepancy` is not among them; it is derived from the two success
/// fields when the analysis is built.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParts {
    pub actual_success: bool,
    pub claimed_success: bool,
    pub turn_count: usize,
    pub friction_points: Vec<String>,
    pub help_used: bool,
    pub help_useful: bool,
    pub improvements: Vec<String>,
    pub score: Option<Score>,
    pub summary: String,
    pub basis: Basis,
}

/// Judgment of a single run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    actual_success: bool,
    claimed_success: bool,
    discrepancy: bool,
    turn_count: usize,
    friction_points: Vec<String>,
    help_used: bool,
    help_useful: bool,
    improvements: Vec<String>,
    score: Option<Score>,
    summary: String,
    #[serde(flatten)]
    basis: Basis,
}

impl From<AnalysisParts> for Analysis {
    fn from(parts: AnalysisParts) -> Self {
        Self {
            discrepancy: parts.actual_success != parts.claimed_success,
            actual_success: parts.actual_success,
            claimed_success: parts.claimed_success,
            turn_count: parts.turn_count,
            friction_points: parts.friction_points,
            help_used: parts.help_used,
            help_useful: parts.help_useful,
            improvements: parts.improvements,
            score: parts.score,
            summary: parts.summary,
            basis: parts.basis,
        }
    }
}

impl Analysis {
    pub fn actual_success(&self) -> bool {
        self.actual_success
    }

    pub fn claimed_success(&self) -> bool {
        self.claimed_success
    }

    /// Whether the agent's claim disagrees with what actually happened.
    pub fn discrepancy(&self) -> bool {
        self.discrepancy
    }

    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    pub fn friction_points(&self) -> &[String] {
        &self.friction_points
    }

    pub fn help_used(&self) -> bool {
        self.help_used
    }

    pub fn help_useful(&self) -> bool {
        self.help_useful
    }

    pub fn improvements(&self) -> &[String] {
        &self.improvements
    }

    /// Absent when the judgment stage did not complete.
    pub fn score(&self) -> Option<Score> {
        self.score
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    /// Whether the judgment stage contributed to this analysis.
    pub fn is_judged(&self) -> bool {
        self.basis == Basis::Judged
    }
}
