//! Provisioning workflows and scenario runs against the in-memory server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vsync_core::scenarios::{BuildUsability, ImportDsl, LoadAfterImport, VcsSync};
use vsync_core::{
    dsl_vcs_root_id, run_scenario, CancellationToken, ContentSource, ConvergenceWaiter, GitCli,
    HarnessConfig, Result, Scenario, ScenarioContext, SettingsActions, VsyncError, WaitPolicy,
};
use vsync_rest::dto::ROOT_PROJECT_ID;
use vsync_rest::fakes::{FakeOp, FakeServer, Fault, StatusStep};

fn actions_for(fake: &Arc<FakeServer>, config: HarnessConfig) -> SettingsActions {
    SettingsActions::new(fake.clone(), ConvergenceWaiter::new(), Arc::new(config))
        .with_settings_policy(WaitPolicy::new(Duration::from_secs(10), Duration::from_secs(1)))
        .with_parameter_policy(WaitPolicy::new(Duration::from_secs(5), Duration::from_secs(1)))
}

fn actions(fake: &Arc<FakeServer>) -> SettingsActions {
    actions_for(fake, common::config())
}

fn quick() -> WaitPolicy {
    WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(10))
}

fn context(
    fake: &Arc<FakeServer>,
    config: HarnessConfig,
    cancel: CancellationToken,
) -> ScenarioContext {
    ScenarioContext::new(Arc::new(config), fake.clone(), Arc::new(GitCli::new()), cancel)
        .unwrap()
        .with_policies(quick(), quick(), quick())
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_provision_creates_resources_in_order() {
    let fake = Arc::new(FakeServer::new());
    let fixture = actions(&fake).provision("Vsync_abc", None).await.unwrap();

    assert_eq!(fixture.project_id, "Vsync_abc");
    assert_eq!(fixture.vcs_root_id, dsl_vcs_root_id("Vsync_abc"));
    assert_eq!(fixture.branch.full(), "refs/heads/main");

    let ops: Vec<FakeOp> = fake.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(
        ops,
        vec![
            FakeOp::FindProject,
            FakeOp::CreateProject,
            FakeOp::CreateVcsRoot,
            FakeOp::PutSettingsConfig,
        ]
    );

    let root = fake.vcs_root("dsl_Vsync_abc_git").unwrap();
    assert_eq!(root.project.id, "Vsync_abc");
    assert_eq!(root.property("branch"), Some("refs/heads/main"));
    assert_eq!(root.property("authMethod"), Some("PASSWORD"));
    assert_eq!(
        root.property("url"),
        Some("https://git.example.com/org/dsl.git")
    );
    assert_eq!(root.property("username"), Some("git"));

    let settings = fake.settings_config("Vsync_abc").unwrap();
    assert_eq!(settings.vcs_root_id, "dsl_Vsync_abc_git");
    assert_eq!(settings.format, "kotlin");
    assert_eq!(settings.import_decision, "importFromVCS");
}

#[tokio::test]
async fn test_anonymous_root_sends_no_credentials() {
    let fake = Arc::new(FakeServer::new());
    let config = common::config_with(&[("VSYNC_VCS_AUTH_METHOD", "anonymous")]);
    actions_for(&fake, config)
        .provision("Vsync_anon", None)
        .await
        .unwrap();

    let root = fake.vcs_root("dsl_Vsync_anon_git").unwrap();
    assert_eq!(root.property("authMethod"), Some("ANONYMOUS"));
    assert_eq!(root.property("username"), None);
    assert_eq!(root.property("secure:password"), None);
}

#[tokio::test]
async fn test_provision_replaces_stale_project() {
    let fake = Arc::new(FakeServer::new());
    fake.add_project("Vsync_old", "left over");

    actions(&fake).provision("Vsync_old", None).await.unwrap();

    assert_eq!(fake.call_count(FakeOp::DeleteProject), 1);
    assert_eq!(fake.call_count(FakeOp::CreateProject), 1);
    assert!(fake.has_project("Vsync_old"));
}

#[tokio::test]
async fn test_ensure_absent_is_quiet_for_missing_project() {
    let fake = Arc::new(FakeServer::new());
    assert!(!actions(&fake).ensure_project_absent("Nope").await.unwrap());
    assert_eq!(fake.call_count(FakeOp::DeleteProject), 0);
}

#[tokio::test]
async fn test_prefix_cleanup_spares_other_projects() {
    let fake = Arc::new(FakeServer::new());
    fake.add_project("Vsync_a1", "a");
    fake.add_project("Vsync_b2", "b");
    fake.add_project("Other", "o");
    let actions = actions(&fake);

    let mut deleted = actions.ensure_projects_with_prefix_absent("Vsync_").await.unwrap();
    deleted.sort();

    assert_eq!(deleted, vec!["Vsync_a1".to_string(), "Vsync_b2".to_string()]);
    assert!(fake.has_project("Other"));
    assert!(fake.has_project(ROOT_PROJECT_ID));

    let err = actions.ensure_projects_with_prefix_absent(" ").await.unwrap_err();
    assert!(matches!(err, VsyncError::InvalidInput(_)));

    actions.ensure_projects_with_prefix_absent("_").await.unwrap();
    assert!(fake.has_project(ROOT_PROJECT_ID));
}

#[tokio::test]
async fn test_unique_project_ids_keep_base() {
    let fake = Arc::new(FakeServer::new());
    let actions = actions(&fake);
    let a = actions.generate_unique_project_id();
    let b = actions.generate_unique_project_id();
    assert!(a.starts_with("Vsync_"));
    assert_ne!(a, b);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
}

// ---------------------------------------------------------------------------
// Settings loads
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_import_waits_through_running_dsl() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Build", "Compile"]);
    fake.script_status(
        "Vsync_imp",
        vec![
            StatusStep::message("Running DSL..."),
            StatusStep::Fault(Fault::Transport),
        ],
    );

    let fixture = actions(&fake)
        .provision_and_import("Vsync_imp", None)
        .await
        .unwrap();

    assert_eq!(fake.call_count(FakeOp::SettingsStatus), 3);
    let types = vsync_core::ServerAssertions::new(fake.clone())
        .build_types_imported(&fixture.project_id)
        .await
        .unwrap();
    assert_eq!(types.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_tolerant_load_reprovisions_vanished_project() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Build"]);
    let actions = actions(&fake);
    let fixture = actions.provision_and_import("Vsync_tl", None).await.unwrap();

    fake.remove_project_on_next_load();
    let snapshot = actions.load_settings_tolerant(&fixture).await.unwrap();

    assert!(!snapshot.is_not_found());
    assert!(fake.has_project("Vsync_tl"));
    assert_eq!(fake.call_count(FakeOp::CreateProject), 2);
    assert_eq!(fake.call_count(FakeOp::LoadSettings), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tolerant_load_reprovisions_when_load_is_refused() {
    let fake = Arc::new(FakeServer::new());
    let actions = actions(&fake);
    let fixture = actions.provision_and_import("Vsync_nf", None).await.unwrap();
    fake.inject_fault(FakeOp::LoadSettings, Fault::NotFound, 1);

    actions.load_settings_tolerant(&fixture).await.unwrap();

    assert_eq!(fake.call_count(FakeOp::CreateProject), 2);
}

#[tokio::test(start_paused = true)]
async fn test_strict_load_reports_vanished_project() {
    let fake = Arc::new(FakeServer::new());
    let actions = actions(&fake);
    actions.provision_and_import("Vsync_st", None).await.unwrap();

    fake.remove_project_on_next_load();
    let err = actions.load_settings("Vsync_st").await.unwrap_err();

    match err {
        VsyncError::WaitFailed { outcome, .. } => assert_eq!(outcome, "aborted"),
        other => panic!("expected WaitFailed, got {other}"),
    }
    assert!(!fake.has_project("Vsync_st"));
}

#[tokio::test(start_paused = true)]
async fn test_settings_that_never_apply_time_out() {
    let fake = Arc::new(FakeServer::new());
    fake.script_status(
        "Vsync_slow",
        (0..100).map(|_| StatusStep::message("Running DSL...")).collect(),
    );

    let err = actions(&fake)
        .provision_and_import("Vsync_slow", None)
        .await
        .unwrap_err();

    match err {
        VsyncError::WaitFailed {
            outcome, last_seen, ..
        } => {
            assert_eq!(outcome, "timed_out");
            assert!(last_seen.contains("Running DSL"));
        }
        other => panic!("expected WaitFailed, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Parameter convergence
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_parameter_count_converges() {
    let fake = Arc::new(FakeServer::new());
    fake.script_parameter_counts("Vsync_Build", &[4, 4, 3]);
    let actions = actions(&fake);

    let params = actions
        .await_build_type_param_count("Vsync_Build", 3, actions.parameter_policy())
        .await
        .unwrap();

    assert_eq!(params.effective_count(), 3);
    assert_eq!(fake.call_count(FakeOp::BuildTypeParameters), 3);
}

#[tokio::test(start_paused = true)]
async fn test_parameter_count_timeout_reports_last_count() {
    let fake = Arc::new(FakeServer::new());
    fake.set_parameter_count("Vsync_Build", 4);
    let actions = actions(&fake);

    let err = actions
        .await_build_type_param_count("Vsync_Build", 3, actions.parameter_policy())
        .await
        .unwrap_err();

    match err {
        VsyncError::Assertion {
            what,
            expected,
            actual,
        } => {
            assert!(what.contains("timed_out"));
            assert_eq!(expected, "3");
            assert_eq!(actual, "4");
        }
        other => panic!("expected Assertion, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_parameter_count_for_unknown_build_type() {
    let fake = Arc::new(FakeServer::new());
    let actions = actions(&fake);
    let err = actions
        .await_build_type_param_count("Missing_Build", 1, actions.parameter_policy())
        .await
        .unwrap_err();
    match err {
        VsyncError::Assertion { what, actual, .. } => {
            assert!(what.contains("aborted"));
            assert!(actual.starts_with("<no successful poll>"), "{actual}");
            assert!(actual.contains("resource not found"), "{actual}");
            assert!(actual.contains("Missing_Build"), "{actual}");
        }
        other => panic!("expected Assertion, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Scenario runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_import_scenario_passes_and_tears_down() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Build"]);
    let ctx = context(&fake, common::config(), CancellationToken::new());

    let report = run_scenario(&ImportDsl, ctx).await;

    assert!(report.passed(), "{:?}", report.result);
    assert!(report.project_id.starts_with("Vsync_"));
    assert!(!fake.has_project(&report.project_id));
    assert!(report.cleanup.is_clean());
}

#[tokio::test]
async fn test_failed_scenario_still_tears_down() {
    let fake = Arc::new(FakeServer::new());
    let ctx = context(&fake, common::config(), CancellationToken::new());

    let report = run_scenario(&ImportDsl, ctx).await;

    let err = report.result.as_ref().unwrap_err();
    assert!(err.to_string().contains("at least one build type"));
    assert!(!fake.has_project(&report.project_id));
    assert_eq!(fake.call_count(FakeOp::DeleteProject), 1);
}

#[tokio::test]
async fn test_load_after_import_survives_project_removal() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Build"]);
    fake.remove_project_on_next_load();
    let ctx = context(&fake, common::config(), CancellationToken::new());

    let report = run_scenario(&LoadAfterImport, ctx).await;

    assert!(report.passed(), "{:?}", report.result);
    assert!(!fake.has_project(&report.project_id));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_scenario_tears_down() {
    let fake = Arc::new(FakeServer::new());
    let cancel = CancellationToken::new();
    let ctx = ScenarioContext::new(
        Arc::new(common::config()),
        fake.clone(),
        Arc::new(GitCli::new()),
        cancel.clone(),
    )
    .unwrap();
    fake.script_status(
        &ctx.project_id,
        (0..1000).map(|_| StatusStep::message("Running DSL...")).collect(),
    );

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });

    let report = run_scenario(&ImportDsl, ctx).await;

    assert!(report.result.as_ref().unwrap_err().is_cancelled());
    assert!(!fake.has_project(&report.project_id));
    assert!(report.duration >= Duration::from_secs(7));
    assert!(report.duration < WaitPolicy::SETTINGS.timeout);
}

struct NoOp;

#[async_trait]
impl Scenario for NoOp {
    fn name(&self) -> &'static str {
        "no-op"
    }

    fn description(&self) -> &'static str {
        "does nothing"
    }

    async fn run(&self, _ctx: &mut ScenarioContext) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_teardown_errors_are_reported_not_returned() {
    let fake = Arc::new(FakeServer::new());
    fake.inject_fault(FakeOp::FindProject, Fault::Status(500), 1);
    let ctx = context(&fake, common::config(), CancellationToken::new());

    let report = run_scenario(&NoOp, ctx).await;

    assert!(report.passed());
    assert_eq!(report.cleanup.errors.len(), 1);
    assert!(report.cleanup.errors[0].contains("500"));
}

#[tokio::test]
async fn test_build_usability_keeps_configured_project() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Compile"]);
    let config = common::config_with(&[("VSYNC_COMPILE_BUILD_TYPE", "Vsync_Compile")]);
    actions_for(&fake, config.clone())
        .provision("Vsync", None)
        .await
        .unwrap();
    fake.script_next_build(&[
        ("queued", None),
        ("running", None),
        ("finished", Some("SUCCESS")),
    ]);

    let ctx = context(&fake, config, CancellationToken::new());
    let report = run_scenario(&BuildUsability, ctx).await;

    assert!(report.passed(), "{:?}", report.result);
    assert!(fake.has_project("Vsync"));
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 1);
}

#[tokio::test]
async fn test_build_usability_requires_compile_build_type() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Compile"]);
    actions(&fake).provision("Vsync", None).await.unwrap();

    let ctx = context(&fake, common::config(), CancellationToken::new());
    let report = run_scenario(&BuildUsability, ctx).await;

    let err = report.result.as_ref().unwrap_err();
    assert!(err.to_string().contains("VSYNC_COMPILE_BUILD_TYPE"));
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 0);
}

#[tokio::test]
async fn test_build_usability_needs_a_connected_agent() {
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Compile"]);
    fake.set_agents(&[]);
    let config = common::config_with(&[("VSYNC_COMPILE_BUILD_TYPE", "Vsync_Compile")]);
    actions_for(&fake, config.clone())
        .provision("Vsync", None)
        .await
        .unwrap();

    let ctx = context(&fake, config, CancellationToken::new());
    let report = run_scenario(&BuildUsability, ctx).await;

    let err = report.result.as_ref().unwrap_err();
    assert!(matches!(err, VsyncError::Assertion { .. }), "{err}");
    assert!(err.to_string().contains("connected agents"));
    assert_eq!(fake.call_count(FakeOp::QueueBuild), 0);
}

#[tokio::test]
async fn test_vcs_sync_end_to_end_with_local_repository() {
    let (_root, bare) = common::seeded_bare_repo();
    let fake = Arc::new(FakeServer::new());
    fake.set_imported_build_types(&["Build"]);
    let config = common::config_with(&[
        ("VSYNC_DSL_REPO_URL", bare.to_str().unwrap()),
        ("VSYNC_SYNC_FILE", ".teamcity/settings.kts"),
        ("VSYNC_BASE_PARAM_COUNT", "4"),
    ]);
    let ctx = context(&fake, config, CancellationToken::new());
    let build_type = format!("{}_Build", ctx.project_id);
    fake.script_parameter_counts(&build_type, &[4, 4, 3]);

    let scenario = VcsSync::new(ContentSource::text("// one parameter fewer\n"));
    let report = run_scenario(&scenario, ctx).await;

    assert!(report.passed(), "{:?}", report.result);
    assert_eq!(report.cleanup.branches_deleted.len(), 1);
    let branch = &report.cleanup.branches_deleted[0];
    assert!(!common::ref_exists(&bare, branch.full()));
    assert!(!fake.has_project(&report.project_id));
    assert_eq!(fake.call_count(FakeOp::LoadSettings), 1);
}

#[tokio::test]
async fn test_vcs_sync_without_content_fails_before_touching_anything() {
    let fake = Arc::new(FakeServer::new());
    let config = common::config();
    let scenario = VcsSync::from_config(&config);
    let ctx = context(&fake, config, CancellationToken::new());

    let report = run_scenario(&scenario, ctx).await;

    assert!(matches!(report.result, Err(VsyncError::Config(_))));
    assert_eq!(fake.call_count(FakeOp::CreateProject), 0);
    assert!(report.cleanup.branches_deleted.is_empty());
}
