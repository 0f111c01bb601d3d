//! Trace Analyzer Tests

use std::sync::{Arc, Mutex};

use agentprobe::analysis::{Basis, Score};
use agentprobe::analyzer::{self, AnalysisError, Analyzer};
use agentprobe::result::{ClaimedSuccess, RunError, RunResult};
use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use crate::{assistant, bash, output, responds, run_of, summary, unreachable_judge, verdict};

/// Three narrative turns, one help invocation, no errors.
fn helpful_run() -> RunResult {
    run_of(
        ClaimedSuccess::Succeeded,
        vec![
            assistant("I'll start by reading the help for pr create."),
            bash("t1", "gh pr create --help"),
            output("t1", "Create a pull request.\n\nUSAGE\n  gh pr create [flags]", false),
            assistant("Now I'll create the pull request."),
            bash("t2", "gh pr create --fill"),
            output("t2", "https://github.com/o/r/pull/7", false),
            assistant("The pull request has been created."),
            summary(14.0, 0.05, "Created https://github.com/o/r/pull/7"),
        ],
    )
}

fn timed_out_run() -> RunResult {
    let mut run = run_of(
        ClaimedSuccess::Unknown,
        vec![assistant("Deploying now."), bash("t1", "vercel deploy")],
    );
    run.tool = "vercel".into();
    run.scenario = "deploy".into();
    run.error = Some(RunError::Timeout { seconds: 600.0 });
    run
}

fn retrying_run() -> RunResult {
    let mut steps = vec![assistant("Let me list containers.")];
    for i in 0..4 {
        let id = format!("t{i}");
        steps.push(bash(&id, "docker ps"));
        let message = "Cannot connect to the Docker daemon. Is the docker daemon running?";
        steps.push(output(&id, message, true));
    }
    steps.push(assistant("I could not reach the Docker daemon."));
    steps.push(summary(30.0, 0.1, "I could not reach the Docker daemon."));
    run_of(ClaimedSuccess::Failed, steps)
}

#[tokio::test]
async fn test_help_run_judged_successful() {
    let run = helpful_run();
    // The judge misses the help invocation; the scan does not.
    let analyzer = Analyzer::new(responds(verdict(true, false, false, "B")));

    let analysis = analyzer.analyze(&run, "Open a PR").await;

    pretty_assert_eq!(analysis.actual_success(), true);
    pretty_assert_eq!(analysis.claimed_success(), true);
    pretty_assert_eq!(analysis.discrepancy(), false);
    pretty_assert_eq!(analysis.turn_count(), 3);
    pretty_assert_eq!(analysis.help_used(), true);
    pretty_assert_eq!(analysis.help_useful(), true);
    pretty_assert_eq!(analysis.score(), Some(Score::B));
    pretty_assert_eq!(analysis.basis(), &Basis::Judged);
    pretty_assert_eq!(
        analysis.friction_points(),
        &["`gh pr create` prompted for a title".to_string()]
    );
    pretty_assert_eq!(
        analysis.improvements(),
        &["Document --fill in the usage line".to_string()]
    );
}

#[test_case(true, ClaimedSuccess::Succeeded, false; "both succeeded")]
#[test_case(false, ClaimedSuccess::Succeeded, true; "overclaimed")]
#[test_case(true, ClaimedSuccess::Failed, true; "underclaimed")]
#[test_case(true, ClaimedSuccess::Unknown, true; "silent success")]
#[test_case(false, ClaimedSuccess::Unknown, false; "silent failure")]
#[tokio::test]
async fn test_discrepancy_ignores_judge_value(
    actual: bool,
    claimed: ClaimedSuccess,
    expected: bool,
) {
    let mut run = helpful_run();
    run.claimed_success = claimed;
    // The judge always reports the opposite discrepancy of the truth.
    let analyzer = Analyzer::new(responds(verdict(actual, !expected, true, "C")));

    let analysis = analyzer.analyze(&run, "Open a PR").await;

    pretty_assert_eq!(analysis.discrepancy(), expected);
    pretty_assert_eq!(
        analysis.discrepancy(),
        analysis.actual_success() != analysis.claimed_success()
    );
}

#[tokio::test]
async fn test_turn_count_comes_from_trace() {
    let mut run = helpful_run();
    run.turn_count = 42;
    let analyzer = Analyzer::new(responds(verdict(true, false, true, "A")));

    pretty_assert_eq!(analyzer.analyze(&run, "Open a PR").await.turn_count(), 3);
    pretty_assert_eq!(analyzer::deterministic(&run, "skipped").turn_count(), 3);
}

#[tokio::test]
async fn test_timed_out_run_is_unsuccessful() {
    let run = timed_out_run();
    // Even a judge convinced of success cannot override the timeout.
    let analyzer = Analyzer::new(responds(verdict(true, false, false, "C")));

    for analysis in [
        analyzer.analyze(&run, "Deploy").await,
        Analyzer::new(unreachable_judge).analyze(&run, "Deploy").await,
    ] {
        pretty_assert_eq!(analysis.actual_success(), false);
        pretty_assert_eq!(analysis.claimed_success(), false);
        pretty_assert_eq!(analysis.discrepancy(), false);
    }
}

#[tokio::test]
async fn test_judge_failure_falls_back() {
    let run = retrying_run();
    let analysis = Analyzer::new(unreachable_judge).analyze(&run, "List containers").await;

    pretty_assert_eq!(analysis.score(), None);
    pretty_assert_eq!(analysis.actual_success(), false);
    pretty_assert_eq!(analysis.discrepancy(), false);
    pretty_assert_eq!(analysis.help_useful(), false);
    pretty_assert_eq!(
        analysis.basis(),
        &Basis::Deterministic {
            reason: "judge failed: connection refused".into()
        }
    );
    assert!(
        analysis
            .friction_points()
            .contains(&"retried `docker ps` 4 times in a row".to_string()),
        "{:?}",
        analysis.friction_points()
    );
    assert!(!analysis.improvements().is_empty());
}

#[tokio::test]
async fn test_fallback_trusts_known_claim() {
    let run = helpful_run();
    let analysis = Analyzer::new(unreachable_judge).analyze(&run, "Open a PR").await;
    pretty_assert_eq!(analysis.actual_success(), true);
    pretty_assert_eq!(analysis.help_used(), true);
    pretty_assert_eq!(analysis.discrepancy(), false);
}

#[test_case("The agent did well. Score: B"; "prose only")]
#[test_case("```json\n{ \"actual_success\": true }\n```"; "missing fields")]
#[test_case("```json\n{ broken\n```"; "invalid json")]
#[tokio::test]
async fn test_unparseable_response_falls_back(response: &str) {
    let run = helpful_run();
    let analyzer = Analyzer::new(responds(response));

    let analysis = analyzer.analyze(&run, "Open a PR").await;
    pretty_assert_eq!(analysis.is_judged(), false);
    pretty_assert_eq!(analysis.score(), None);

    let error = analyzer.try_analyze(&run, "Open a PR").await.unwrap_err();
    assert!(
        matches!(error, AnalysisError::MissingBlock | AnalysisError::Shape { .. }),
        "{error:?}"
    );
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let run = retrying_run();
    let analyzer = Analyzer::new(responds(verdict(false, false, false, "D")));

    let first = analyzer.analyze(&run, "List containers").await;
    let second = analyzer.analyze(&run, "List containers").await;
    pretty_assert_eq!(first, second);

    let first = analyzer::deterministic(&run, "skipped");
    let second = analyzer::deterministic(&run, "skipped");
    pretty_assert_eq!(first, second);
}

#[tokio::test]
async fn test_quiet_trace_has_no_scan_friction() {
    let run = run_of(
        ClaimedSuccess::Unknown,
        vec![assistant("Nothing needed doing."), summary(1.0, 0.0, "Nothing needed doing.")],
    );

    let analysis = analyzer::deterministic(&run, "skipped");
    pretty_assert_eq!(analysis.help_used(), false);
    pretty_assert_eq!(analysis.friction_points(), &[] as &[String]);
}

#[tokio::test]
async fn test_judge_sees_rendered_trace() {
    let prompts = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = prompts.clone();
    let response = verdict(true, false, true, "A");
    let judge = move |prompt: &str| -> Result<String, AnalysisError> {
        seen.lock().unwrap().push(prompt.to_string());
        Ok(response.clone())
    };

    Analyzer::new(judge).analyze(&timed_out_run(), "Deploy the app").await;

    let prompts = prompts.lock().unwrap();
    pretty_assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("Deploy the app"), "{prompt}");
    assert!(prompt.contains("`vercel`"), "{prompt}");
    assert!(prompt.contains("`unknown`"), "{prompt}");
    assert!(prompt.contains(r#"[1] tool_use: Bash {"command":"vercel deploy"}"#), "{prompt}");
}

#[tokio::test]
async fn test_persisted_run_analyzes_the_same() {
    let run = retrying_run();
    let json = serde_json::to_string(&run).unwrap();
    let restored = serde_json::from_str::<RunResult>(&json).unwrap();
    pretty_assert_eq!(&restored, &run);

    let analyzer = Analyzer::new(responds(verdict(false, false, false, "D")));
    pretty_assert_eq!(
        analyzer.analyze(&restored, "List containers").await,
        analyzer.analyze(&run, "List containers").await
    );
}
