//! Build completion against the fake server's scripted progressions.

use std::sync::Arc;
use std::time::Duration;

use vsync_core::{
    BuildAwaiter, ConvergenceWaiter, JobHandle, JobState, VsyncError, WaitOutcome, WaitPolicy,
};
use vsync_rest::fakes::{FakeOp, FakeServer, Fault};

fn awaiter(fake: &Arc<FakeServer>) -> BuildAwaiter {
    BuildAwaiter::new(fake.clone(), ConvergenceWaiter::new())
}

fn policy() -> WaitPolicy {
    WaitPolicy::new(Duration::from_secs(60), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_success_on_third_poll() {
    let fake = Arc::new(FakeServer::new());
    fake.script_next_build(&[
        ("queued", None),
        ("queued", None),
        ("finished", Some("SUCCESS")),
    ]);
    let builds = awaiter(&fake);

    let job = builds.queue("Vsync_Compile").await.unwrap();
    let outcome = builds.await_completion(&job, policy()).await.unwrap();

    match outcome {
        WaitOutcome::Converged {
            snapshot,
            attempts,
            elapsed,
        } => {
            assert!(snapshot.is_success());
            assert_eq!(attempts, 3);
            assert_eq!(elapsed, Duration::from_secs(10));
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(fake.call_count(FakeOp::GetBuild), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_reported_on_first_poll() {
    let fake = Arc::new(FakeServer::new());
    fake.script_next_build(&[("finished", Some("FAILURE"))]);
    let builds = awaiter(&fake);

    let err = builds
        .queue_and_await_success("Vsync_Compile", policy())
        .await
        .unwrap_err();

    match err {
        VsyncError::BuildFailed {
            build_type, detail, ..
        } => {
            assert_eq!(build_type, "Vsync_Compile");
            assert!(detail.contains("FAILURE"));
        }
        other => panic!("expected BuildFailed, got {other}"),
    }
    assert_eq!(fake.call_count(FakeOp::GetBuild), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_then_success() {
    let fake = Arc::new(FakeServer::new());
    fake.script_next_build(&[
        ("queued", None),
        ("running", None),
        ("running", None),
        ("finished", Some("SUCCESS")),
    ]);
    let job = awaiter(&fake)
        .queue_and_await_success("Vsync_Compile", policy())
        .await
        .unwrap();
    assert_eq!(job.build_type, "Vsync_Compile");
    assert_eq!(fake.call_count(FakeOp::GetBuild), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_build_aborts_without_retrying() {
    let fake = Arc::new(FakeServer::new());
    let job = JobHandle {
        id: 4242,
        build_type: "Vsync_Compile".to_string(),
    };

    let outcome = awaiter(&fake).await_completion(&job, policy()).await.unwrap();

    assert!(outcome.is_aborted(), "{outcome:?}");
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(fake.call_count(FakeOp::GetBuild), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_errors_are_retried() {
    let fake = Arc::new(FakeServer::new());
    fake.script_next_build(&[("finished", Some("SUCCESS"))]);
    fake.inject_fault(FakeOp::GetBuild, Fault::Status(503), 2);

    let job = awaiter(&fake)
        .queue_and_await_success("Vsync_Compile", policy())
        .await
        .unwrap();
    assert_eq!(job.id, 1);
    assert_eq!(fake.call_count(FakeOp::GetBuild), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_in_queue_times_out() {
    let fake = Arc::new(FakeServer::new());
    fake.script_next_build(&[("queued", None)]);

    let err = awaiter(&fake)
        .queue_and_await_success(
            "Vsync_Compile",
            WaitPolicy::new(Duration::from_secs(20), Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    match err {
        VsyncError::WaitFailed {
            outcome, last_seen, ..
        } => {
            assert_eq!(outcome, "timed_out");
            assert!(last_seen.contains("queued"));
        }
        other => panic!("expected WaitFailed, got {other}"),
    }
    assert_eq!(fake.call_count(FakeOp::GetBuild), 4);
}

#[tokio::test]
async fn test_queue_rejects_blank_build_type() {
    let fake = Arc::new(FakeServer::new());
    let err = awaiter(&fake).queue("  ").await.unwrap_err();
    assert!(matches!(err, VsyncError::InvalidInput(_)));
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 0);
}

#[test]
fn test_unknown_state_counts_as_failure() {
    let build = vsync_rest::dto::BuildDto::new(3, "deleted", None);
    let state = JobState::from_build(&build);
    assert!(state.is_failure());
    assert!(state.failure_detail().unwrap().contains("deleted"));
}

#[tokio::test]
async fn test_invalid_policy_queues_nothing() {
    let fake = Arc::new(FakeServer::new());
    let builds = awaiter(&fake);
    let too_short = WaitPolicy::BUILD.with_timeout(Duration::from_secs(3));

    let err = builds
        .queue_and_await_success("Vsync_Compile", too_short)
        .await
        .unwrap_err();

    assert!(matches!(err, VsyncError::InvalidInput(_)), "{err}");
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 0);
}

#[tokio::test]
async fn test_cancelled_awaiter_queues_nothing() {
    let fake = Arc::new(FakeServer::new());
    let cancel = vsync_core::CancellationToken::new();
    cancel.cancel();
    let builds = BuildAwaiter::new(fake.clone(), ConvergenceWaiter::with_cancellation(cancel));

    let err = builds
        .queue_and_await_success("Vsync_Compile", policy())
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "{err}");
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 0);
}
