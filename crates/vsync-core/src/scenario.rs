//! Scenario contract and the runner that guarantees teardown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use vsync_rest::ServerApi;

use crate::actions::SettingsActions;
use crate::assertions::ServerAssertions;
use crate::build::BuildAwaiter;
use crate::config::HarnessConfig;
use crate::domain::{Result, VsyncError};
use crate::fixtures::{CleanupReport, FixtureScope};
use crate::git::VcsTransport;
use crate::metrics::METRICS;
use crate::naming;
use crate::obs::{self, ScenarioSpan};
use crate::wait::{ConvergenceWaiter, WaitPolicy};

/// Everything one scenario run owns.
///
/// The context is built per run: its fixture scope and generated project id
/// belong to that run alone and are released by [`run_scenario`].
pub struct ScenarioContext {
    pub config: Arc<HarnessConfig>,
    pub api: Arc<dyn ServerApi>,
    pub actions: SettingsActions,
    pub assertions: ServerAssertions,
    pub builds: BuildAwaiter,
    pub fixtures: FixtureScope,
    /// Generated id of the project this run provisions and tears down.
    pub project_id: String,
    build_policy: WaitPolicy,
    cancel: CancellationToken,
}

impl ScenarioContext {
    pub fn new(
        config: Arc<HarnessConfig>,
        api: Arc<dyn ServerApi>,
        transport: Arc<dyn VcsTransport>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let waiter = ConvergenceWaiter::with_cancellation(cancel.clone());
        let fixtures = FixtureScope::new(config.remote_repo()?, transport, &config.sync_file)?
            .with_branch_prefix(&config.branch_prefix);
        Ok(ScenarioContext {
            actions: SettingsActions::new(api.clone(), waiter.clone(), config.clone()),
            assertions: ServerAssertions::new(api.clone()),
            builds: BuildAwaiter::new(api.clone(), waiter),
            fixtures,
            project_id: naming::unique_project_id(&config.project_id),
            build_policy: WaitPolicy::BUILD,
            config,
            api,
            cancel,
        })
    }

    /// Override the settings, parameter and build wait policies.
    pub fn with_policies(
        mut self,
        settings: WaitPolicy,
        parameters: WaitPolicy,
        build: WaitPolicy,
    ) -> Self {
        self.actions = self
            .actions
            .with_settings_policy(settings)
            .with_parameter_policy(parameters);
        self.build_policy = build;
        self
    }

    pub fn build_policy(&self) -> WaitPolicy {
        self.build_policy
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
pub trait Scenario: Send + Sync {
    /// Stable kebab-case name used on the command line.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()>;
}

/// Result of one scenario run, teardown included.
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub project_id: String,
    pub duration: Duration,
    pub result: Result<()>,
    pub cleanup: CleanupReport,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `scenario` and always tear down afterwards.
///
/// Cancellation stops the body at its next await point; teardown still
/// runs. Teardown problems go to the cleanup report and the log, never
/// into `result`.
pub async fn run_scenario(scenario: &dyn Scenario, mut ctx: ScenarioContext) -> ScenarioReport {
    let span = ScenarioSpan::new(scenario.name(), &ctx.project_id);
    run_in_span(scenario, &mut ctx).instrument(span.span()).await
}

async fn run_in_span(scenario: &dyn Scenario, ctx: &mut ScenarioContext) -> ScenarioReport {
    let name = scenario.name();
    obs::emit_scenario_started(name, &ctx.project_id);
    let started = Instant::now();

    let cancel = ctx.cancel.clone();
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VsyncError::Cancelled {
            what: format!("scenario {name}"),
        }),
        outcome = scenario.run(&mut *ctx) => outcome,
    };

    let cleanup = teardown(ctx).await;
    let duration = started.elapsed();
    obs::emit_scenario_finished(name, duration.as_millis() as u64, result.is_ok());

    ScenarioReport {
        name: name.to_string(),
        project_id: ctx.project_id.clone(),
        duration,
        result,
        cleanup,
    }
}

async fn teardown(ctx: &mut ScenarioContext) -> CleanupReport {
    let project_error = ctx
        .actions
        .ensure_project_absent(&ctx.project_id)
        .await
        .err();

    let mut report = ctx.fixtures.cleanup_all().await;
    if let Some(err) = project_error {
        let resource = format!("project {}", ctx.project_id);
        METRICS.inc_cleanup_errors();
        obs::emit_cleanup_error(&resource, &err);
        report.errors.push(format!("{resource}: {err}"));
    }
    report
}
