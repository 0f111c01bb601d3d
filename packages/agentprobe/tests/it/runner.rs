//! Session Runner Tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentprobe::credential::{Credential, Secret};
use agentprobe::result::{ClaimedSuccess, RunError};
use agentprobe::runner::{Cancellation, ChannelSink, ExecuteOptions, Runner};
use agentprobe::runtime::{AgentRuntime, EventStream, ExecutionContext, ExecutionError};
use agentprobe::trace::{AgentEvent, EventKind, RunSummary};
use async_trait::async_trait;
use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::{BrokenRuntime, ScriptedRuntime, Step, assistant, bash, output, summary};

fn options() -> ExecuteOptions {
    ExecuteOptions::builder().scenario("create-pr").working_dir("/tmp").build()
}

#[tokio::test]
async fn test_full_run_is_folded() {
    let runtime = ScriptedRuntime::new([
        Step::Event(AgentEvent::System {
            subtype: "init".into(),
            session_id: Some("s1".into()),
            model: None,
        }),
        assistant("Let me check how to open a pull request."),
        bash("t1", "gh pr create --help"),
        output("t1", "Usage: gh pr create [flags]", false),
        bash("t2", "gh pr create --fill"),
        output("t2", "https://github.com/o/r/pull/1", false),
        assistant("The pull request has been created."),
        summary(12.5, 0.04, "Opened https://github.com/o/r/pull/1"),
    ]);

    let result = Runner::new(runtime).execute("gh", "Open a PR", options()).await.unwrap();

    pretty_assert_eq!(result.tool, "gh");
    pretty_assert_eq!(result.scenario, "create-pr");
    pretty_assert_eq!(result.turn_count, 2);
    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Succeeded);
    pretty_assert_eq!(result.duration_seconds, 12.5);
    pretty_assert_eq!(result.cost_usd, 0.04);
    pretty_assert_eq!(result.error, None);
    pretty_assert_eq!(
        result.trace.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        (0..8).collect::<Vec<u64>>()
    );
    pretty_assert_eq!(result.events_of(EventKind::ToolUse).count(), 2);
}

#[tokio::test]
async fn test_context_reaches_runtime() {
    let runtime = Arc::new(ScriptedRuntime::new([summary(1.0, 0.0, "ok")]));
    let options = ExecuteOptions::builder()
        .working_dir("/srv/work")
        .credential(Credential::OAuthToken(Secret::new("token")))
        .max_turns(7)
        .model("sonnet")
        .build();

    Runner::new(SharedRuntime(runtime.clone()))
        .execute("vercel", "Deploy it", options)
        .await
        .unwrap();

    let started = runtime.started();
    pretty_assert_eq!(started.len(), 1);
    let (task, context) = &started[0];
    pretty_assert_eq!(task, "Deploy it");
    pretty_assert_eq!(context.tool, "vercel");
    pretty_assert_eq!(context.working_dir, PathBuf::from("/srv/work"));
    pretty_assert_eq!(context.credential, Credential::OAuthToken(Secret::new("token")));
    pretty_assert_eq!(context.max_turns, 7);
    pretty_assert_eq!(context.model.as_deref(), Some("sonnet"));
}

#[tokio::test]
async fn test_default_scenario_id() {
    let runtime = ScriptedRuntime::new([summary(1.0, 0.0, "ok")]);
    let options = ExecuteOptions::builder().working_dir("/tmp").build();
    let result = Runner::new(runtime).execute("gh", "task", options).await.unwrap();
    pretty_assert_eq!(result.scenario, "ad-hoc");
}

#[tokio::test]
async fn test_zero_assistant_messages_is_valid() {
    let runtime = ScriptedRuntime::new([
        bash("t1", "docker ps"),
        output("t1", "CONTAINER ID   IMAGE", false),
        Step::Event(AgentEvent::RunSummary(Default::default())),
    ]);

    let result = Runner::new(runtime).execute("docker", "List", options()).await.unwrap();

    pretty_assert_eq!(result.turn_count, 0);
    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Unknown);
    pretty_assert_eq!(result.error, None);
    pretty_assert_eq!(result.trace.len(), 3);
}

#[tokio::test]
async fn test_stream_error_fails_run_despite_claim() {
    let runtime = ScriptedRuntime::new([
        assistant("Deployed successfully."),
        Step::Error("claude exited with exit status: 1".into()),
        assistant("never seen"),
    ]);

    let result = Runner::new(runtime).execute("vercel", "Deploy", options()).await.unwrap();

    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Succeeded);
    pretty_assert_eq!(
        result.error,
        Some(RunError::Stream {
            message: "claude exited with exit status: 1".into()
        })
    );
    pretty_assert_eq!(result.trace.len(), 1);
    assert!(result.is_failed());
}

#[tokio::test]
async fn test_stream_closed_without_summary_is_incomplete() {
    let runtime = ScriptedRuntime::new([assistant("Working on it."), bash("t1", "gh repo view")]);

    let result = Runner::new(runtime).execute("gh", "View", options()).await.unwrap();

    pretty_assert_eq!(result.error, Some(RunError::Incomplete));
    pretty_assert_eq!(result.turn_count, 1);
    pretty_assert_eq!(result.trace.len(), 2);
}

#[tokio::test]
async fn test_error_summary_fails_run() {
    let runtime = ScriptedRuntime::new([
        assistant("Still trying."),
        Step::Event(AgentEvent::RunSummary(RunSummary {
            subtype: "error_max_turns".into(),
            is_error: true,
            duration_seconds: 40.0,
            ..Default::default()
        })),
    ]);

    let result = Runner::new(runtime).execute("gh", "task", options()).await.unwrap();

    pretty_assert_eq!(result.error.as_ref().map(|e| e.kind()), Some("stream"));
    pretty_assert_eq!(result.duration_seconds, 40.0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_partial_result() {
    let runtime = ScriptedRuntime::new([assistant("Deploying now."), Step::Hang]);
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .timeout(Duration::from_secs(30))
        .build();

    let result = Runner::new(runtime).execute("vercel", "Deploy", options).await.unwrap();

    pretty_assert_eq!(result.error, Some(RunError::Timeout { seconds: 30.0 }));
    pretty_assert_eq!(result.turn_count, 1);
    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Unknown);
    assert!((30.0..31.0).contains(&result.duration_seconds), "{}", result.duration_seconds);
}

#[tokio::test(start_paused = true)]
async fn test_slow_run_within_timeout_completes() {
    let runtime = ScriptedRuntime::new([
        assistant("Waiting for the build."),
        Step::Sleep(Duration::from_secs(20)),
        summary(20.0, 0.0, "All done."),
    ]);
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .timeout(Duration::from_secs(30))
        .build();

    let result = Runner::new(runtime).execute("vercel", "Deploy", options).await.unwrap();

    pretty_assert_eq!(result.error, None);
    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_returns_partial_result() {
    let runtime = ScriptedRuntime::new([assistant("Starting."), Step::Hang]);
    let (handle, cancellation) = Cancellation::new();
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .cancellation(cancellation)
        .build();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
    });
    let result = Runner::new(runtime).execute("gh", "task", options).await.unwrap();

    pretty_assert_eq!(result.error, Some(RunError::Cancelled));
    pretty_assert_eq!(result.trace.len(), 1);
}

#[tokio::test]
async fn test_startup_failure_is_raised() {
    let result = Runner::new(BrokenRuntime).execute("gh", "task", options()).await;
    assert!(matches!(result, Err(ExecutionError::Startup { .. })));
}

#[tokio::test]
async fn test_sink_sees_every_event_in_order() {
    let runtime = ScriptedRuntime::new([
        assistant("Looking."),
        bash("t1", "gh --help"),
        output("t1", "usage", false),
        summary(3.0, 0.01, "Done."),
    ]);
    let (sink, mut events) = ChannelSink::new();
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .sink(Arc::new(sink))
        .build();

    let result = Runner::new(runtime).execute("gh", "task", options).await.unwrap();

    let mut observed = Vec::new();
    while let Ok(event) = events.try_recv() {
        observed.push(event);
    }
    pretty_assert_eq!(observed, result.trace);
}

#[tokio::test]
async fn test_custom_claim_detector() {
    let runtime = ScriptedRuntime::new([
        assistant("STATUS: DONE"),
        summary(1.0, 0.0, "STATUS: DONE"),
    ]);
    let runner = Runner::new(runtime).with_claims(|text: &str| {
        if text.contains("DONE") {
            ClaimedSuccess::Succeeded
        } else {
            ClaimedSuccess::Unknown
        }
    });

    let result = runner.execute("gh", "task", options()).await.unwrap();
    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Succeeded);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let runner = Arc::new(Runner::new(ScriptedRuntime::new([
        assistant("All done."),
        summary(2.0, 0.5, "All done."),
    ])));

    let handles = (0..4)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.execute("gh", "task", options()).await })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        pretty_assert_eq!(result.trace.len(), 2);
        pretty_assert_eq!(result.cost_usd, 0.5);
    }
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_timeout_is_recorded() {
    let runtime = ScriptedRuntime::new([Step::Hang]);
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .timeout(Duration::from_millis(250))
        .build();

    let result = Runner::new(runtime).execute("gh", "task", options).await.unwrap();

    pretty_assert_eq!(result.error, Some(RunError::Timeout { seconds: 0.25 }));
}

#[tokio::test]
async fn test_progress_narration_is_not_a_claim() {
    let runtime = ScriptedRuntime::new([
        assistant("The project was cloned successfully. Now let me deploy it."),
        bash("t1", "vercel deploy"),
        output("t1", "Error: not authorized", true),
        assistant("I was unable to deploy because the CLI is not authorized."),
        summary(9.0, 0.02, "I was unable to deploy because the CLI is not authorized."),
    ]);

    let result = Runner::new(runtime).execute("vercel", "Deploy", options()).await.unwrap();

    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Failed);
}

#[tokio::test]
async fn test_early_obstacle_is_not_a_claim() {
    let runtime = ScriptedRuntime::new([
        assistant("I can't see a config file yet, so let me create one."),
        bash("t1", "gh repo create demo --private"),
        output("t1", "https://github.com/o/demo", false),
        assistant("The repository has been created successfully."),
        summary(6.0, 0.01, "The repository has been created successfully."),
    ]);

    let result = Runner::new(runtime).execute("gh", "Create a repo", options()).await.unwrap();

    pretty_assert_eq!(result.claimed_success, ClaimedSuccess::Succeeded);
}

#[tokio::test]
async fn test_sink_observes_before_run_ends() {
    let runtime = ScriptedRuntime::new([assistant("Looking."), Step::Error("boom".into())]);
    let (sink, mut events) = ChannelSink::new();
    let options = ExecuteOptions::builder()
        .working_dir("/tmp")
        .sink(Arc::new(sink))
        .build();

    let result = Runner::new(runtime).execute("gh", "task", options).await.unwrap();

    let observed = events.try_recv().unwrap();
    pretty_assert_eq!(observed.sequence, 0);
    pretty_assert_eq!(&observed, &result.trace[0]);
}

/// Lets a test keep a handle on the runtime it gave to a runner.
struct SharedRuntime(Arc<ScriptedRuntime>);

#[async_trait]
impl AgentRuntime for SharedRuntime {
    async fn start(
        &self,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<EventStream, ExecutionError> {
        self.0.start(task, context).await
    }
}
