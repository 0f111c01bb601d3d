//! Detecting the agent's own claim of success in free-form text.
//!
//! This is a heuristic; the runner takes any [`ClaimDetector`] so the rules
//! can be swapped out or tightened without touching the fold.

use std::sync::LazyLock;

use regex::Regex;

use crate::result::ClaimedSuccess;

/// Maps a piece of agent text to the outcome it asserts, if any.
pub trait ClaimDetector: Send + Sync {
    fn detect(&self, text: &str) -> ClaimedSuccess;
}

impl<F> ClaimDetector for F
where
    F: Fn(&str) -> ClaimedSuccess + Send + Sync,
{
    fn detect(&self, text: &str) -> ClaimedSuccess {
        self(text)
    }
}

/// Keyword-based claim detection.
///
/// Text is read sentence by sentence and the last sentence that either
/// claims an outcome or announces more work decides. A sentence announcing
/// more work ("Now let me deploy it.") means the text is progress narration,
/// not a claim. Within a sentence, failure phrases are checked before success
/// phrases, so "I was unable to deploy, although the build completed
/// successfully" reads as a failure. Text with no decisive sentence is
/// [`ClaimedSuccess::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClaims;

static FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:i\ was|i\ am|i'm)\ (?:unable|not\ able)\ to\b
        | \bi\ (?:couldn't|could\ not|can't|cannot)\b
        | \bfailed\ to\ (?:complete|finish|create|deploy|run|accomplish)\b
        | \bunable\ to\ (?:complete|finish|accomplish)\b
        | \b(?:did\ not|didn't)\ (?:succeed|work|complete)\b
        | \btask\ (?:has\ )?failed\b
        | \bwas\ not\ successful\b
        | ❌",
    )
    .expect("compile failure claim regex")
});

static SUCCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \bsuccessfully\b
        | \btask\ (?:is\ |has\ been\ )?(?:complete|completed|done|finished)\b
        | \b(?:i've|i\ have)\ (?:completed|finished|accomplished)\b
        | \bhas\ been\ (?:created|deployed|completed|configured|set\ up|published|merged)\b
        | \ball\ done\b
        | \bworked\ as\ expected\b
        | ✅",
    )
    .expect("compile success claim regex")
});

static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \blet\ me\b
        | \blet's\b
        | \b(?:now|next|then),?\ i(?:'ll|\ will|\ need\ to)\b
        | \bi(?:'ll|\ will)\ (?:now|next)\b
        | \bnext,?\ (?:let|i)\b",
    )
    .expect("compile progress regex")
});

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("compile sentence regex"));

/// Whether a sentence announces more work to come.
///
/// "Let me know" closes a report rather than announcing work.
fn announces_work(sentence: &str) -> bool {
    PROGRESS.find_iter(sentence).any(|found| {
        let rest = sentence[found.end()..].trim_start();
        !rest.get(..4).is_some_and(|word| word.eq_ignore_ascii_case("know"))
    })
}

fn classify(sentence: &str) -> Option<ClaimedSuccess> {
    if announces_work(sentence) {
        Some(ClaimedSuccess::Unknown)
    } else if FAILURE.is_match(sentence) {
        Some(ClaimedSuccess::Failed)
    } else if SUCCESS.is_match(sentence) {
        Some(ClaimedSuccess::Succeeded)
    } else {
        None
    }
}

impl ClaimDetector for KeywordClaims {
    fn detect(&self, text: &str) -> ClaimedSuccess {
        SENTENCE_END
            .split(text)
            .filter_map(classify)
            .last()
            .unwrap_or_default()
    }
}
