//! Multi-step workflows against the build server.
//!
//! Sequencing: a project exists before its VCS root is created, the VCS
//! root exists before versioned settings are enabled, and settings are
//! enabled before the first status wait. Plain CRUD steps are a direct
//! fetch plus a conditional write; only reconciliation is polled.

use std::sync::Arc;

use tracing::{info, warn};
use vsync_rest::dto::{
    CreateProjectRequest, CreateVcsRootRequest, ParametersDto, ProjectDto, PropertyDto,
    VersionedSettingsConfig, ROOT_PROJECT_ID,
};
use vsync_rest::{ServerApi, StatusSnapshot};

use crate::config::{HarnessConfig, VcsAuthMethod};
use crate::domain::{BranchRef, ProjectFixture, Result, SettingsPhase, VsyncError};
use crate::naming;
use crate::wait::{ConvergenceWaiter, WaitOutcome, WaitPolicy};

/// Id of the settings VCS root attached to `project_id`.
pub fn dsl_vcs_root_id(project_id: &str) -> String {
    format!("dsl_{project_id}_git")
}

#[derive(Clone)]
pub struct SettingsActions {
    api: Arc<dyn ServerApi>,
    waiter: ConvergenceWaiter,
    config: Arc<HarnessConfig>,
    settings_policy: WaitPolicy,
    parameter_policy: WaitPolicy,
}

impl SettingsActions {
    pub fn new(
        api: Arc<dyn ServerApi>,
        waiter: ConvergenceWaiter,
        config: Arc<HarnessConfig>,
    ) -> Self {
        SettingsActions {
            api,
            waiter,
            config,
            settings_policy: WaitPolicy::SETTINGS,
            parameter_policy: WaitPolicy::PARAMETERS,
        }
    }

    pub fn with_settings_policy(mut self, policy: WaitPolicy) -> Self {
        self.settings_policy = policy;
        self
    }

    pub fn with_parameter_policy(mut self, policy: WaitPolicy) -> Self {
        self.parameter_policy = policy;
        self
    }

    pub fn api(&self) -> &Arc<dyn ServerApi> {
        &self.api
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn settings_policy(&self) -> WaitPolicy {
        self.settings_policy
    }

    pub fn parameter_policy(&self) -> WaitPolicy {
        self.parameter_policy
    }

    /// A fresh project id derived from the configured base id.
    pub fn generate_unique_project_id(&self) -> String {
        naming::unique_project_id(&self.config.project_id)
    }

    // -----------------------------------------------------------------------
    // Project CRUD
    // -----------------------------------------------------------------------

    /// Delete the project if it exists. Returns whether anything was deleted.
    pub async fn ensure_project_absent(&self, project_id: &str) -> Result<bool> {
        if self.api.find_project(project_id).await?.is_none() {
            return Ok(false);
        }
        match self.api.delete_project(project_id).await {
            Ok(()) => {
                info!(event = "project.deleted", project_id = %project_id);
                Ok(true)
            }
            // Removed between the fetch and the delete.
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every project whose id starts with `prefix`. The root project
    /// is never touched.
    pub async fn ensure_projects_with_prefix_absent(&self, prefix: &str) -> Result<Vec<String>> {
        if prefix.trim().is_empty() {
            return Err(VsyncError::InvalidInput(
                "refusing to delete projects with an empty prefix".to_string(),
            ));
        }
        let listing = self.api.list_projects().await?;
        let doomed: Vec<String> = listing
            .ids_with_prefix(prefix)
            .filter(|id| *id != ROOT_PROJECT_ID)
            .map(str::to_string)
            .collect();

        let mut deleted = Vec::with_capacity(doomed.len());
        for id in doomed {
            if self.ensure_project_absent(&id).await? {
                deleted.push(id);
            }
        }
        Ok(deleted)
    }

    pub async fn create_project(&self, project_id: &str, name: &str) -> Result<ProjectDto> {
        let project = self
            .api
            .create_project(&CreateProjectRequest::under_root(project_id, name))
            .await?;
        info!(event = "project.created", project_id = %project.id);
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // VCS root & versioned settings
    // -----------------------------------------------------------------------

    /// Attach a git root for the settings repository to `project_id`,
    /// tracking `branch` or the configured default branch.
    pub async fn create_dsl_vcs_root(
        &self,
        project_id: &str,
        branch: Option<&BranchRef>,
    ) -> Result<String> {
        let repo = &self.config.repo;
        let branch = branch.unwrap_or(&repo.default_branch);
        let remote = self.config.remote_repo()?;

        let mut properties = vec![
            PropertyDto::new("url", &remote.display_url()),
            PropertyDto::new("branch", branch.full()),
            PropertyDto::new("authMethod", repo.auth_method.as_str()),
        ];
        if repo.auth_method == VcsAuthMethod::Password {
            properties.push(PropertyDto::new("username", &repo.username));
            properties.push(PropertyDto::new("secure:password", repo.token.expose()));
        }

        let id = dsl_vcs_root_id(project_id);
        let created = self
            .api
            .create_vcs_root(&CreateVcsRootRequest::git(&id, &id, project_id, properties))
            .await?;
        info!(
            event = "vcs_root.created",
            project_id = %project_id,
            vcs_root_id = %created,
            branch = %branch,
        );
        Ok(created)
    }

    pub async fn enable_versioned_settings(
        &self,
        project_id: &str,
        vcs_root_id: &str,
    ) -> Result<()> {
        self.api
            .put_versioned_settings_config(
                project_id,
                &VersionedSettingsConfig::kotlin_import_from_vcs(vcs_root_id),
            )
            .await?;
        info!(event = "settings.enabled", project_id = %project_id, vcs_root_id = %vcs_root_id);
        Ok(())
    }

    /// Replace any stale project, then create project, VCS root and
    /// versioned settings in that order.
    pub async fn provision(
        &self,
        project_id: &str,
        branch: Option<&BranchRef>,
    ) -> Result<ProjectFixture> {
        self.ensure_project_absent(project_id).await?;
        let project = self.create_project(project_id, project_id).await?;
        let vcs_root_id = self.create_dsl_vcs_root(&project.id, branch).await?;
        self.enable_versioned_settings(&project.id, &vcs_root_id)
            .await?;
        Ok(ProjectFixture {
            project_name: project.name.clone().unwrap_or_else(|| project.id.clone()),
            project_id: project.id,
            vcs_root_id,
            branch: branch
                .cloned()
                .unwrap_or_else(|| self.config.repo.default_branch.clone()),
        })
    }

    /// Provision and wait until the repository settings were applied.
    pub async fn provision_and_import(
        &self,
        project_id: &str,
        branch: Option<&BranchRef>,
    ) -> Result<ProjectFixture> {
        let fixture = self.provision(project_id, branch).await?;
        self.await_settings_applied(&fixture.project_id).await?;
        Ok(fixture)
    }

    // -----------------------------------------------------------------------
    // Reconciliation waits
    // -----------------------------------------------------------------------

    /// Poll the settings status until it reports `phase`. A missing project
    /// is terminal.
    pub async fn wait_for_phase(
        &self,
        project_id: &str,
        phase: SettingsPhase,
        policy: WaitPolicy,
    ) -> Result<WaitOutcome<StatusSnapshot>> {
        let api = self.api.clone();
        let id = project_id.to_string();
        self.waiter
            .wait_until(
                &format!("settings of {project_id} to reach '{phase}'"),
                policy,
                move || {
                    let api = api.clone();
                    let id = id.clone();
                    async move {
                        api.versioned_settings_status(&id)
                            .await
                            .map_err(VsyncError::from)
                    }
                },
                move |snapshot: &StatusSnapshot| phase.matches(snapshot),
                StatusSnapshot::is_not_found,
            )
            .await
    }

    pub async fn await_settings_applied(&self, project_id: &str) -> Result<StatusSnapshot> {
        self.wait_for_phase(project_id, SettingsPhase::AppliedChanges, self.settings_policy)
            .await?
            .into_converged(&format!("versioned settings of {project_id}"))
    }

    /// Ask the server to load settings and wait until they are applied.
    pub async fn load_settings(&self, project_id: &str) -> Result<StatusSnapshot> {
        self.api.load_versioned_settings(project_id).await?;
        self.await_settings_applied(project_id).await
    }

    /// Like [`Self::load_settings`], but if the project disappears during
    /// the load it is provisioned again once and awaited.
    pub async fn load_settings_tolerant(&self, fixture: &ProjectFixture) -> Result<StatusSnapshot> {
        let project_id = fixture.project_id.as_str();
        match self.api.load_versioned_settings(project_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return self.reprovision(fixture).await,
            Err(e) => return Err(e.into()),
        }

        let outcome = self
            .wait_for_phase(project_id, SettingsPhase::AppliedChanges, self.settings_policy)
            .await?;
        let vanished = match &outcome {
            WaitOutcome::Aborted { last: Some(s), .. } => s.is_not_found(),
            _ => false,
        };
        if vanished {
            return self.reprovision(fixture).await;
        }
        outcome.into_converged(&format!("versioned settings of {project_id} after load"))
    }

    async fn reprovision(&self, fixture: &ProjectFixture) -> Result<StatusSnapshot> {
        warn!(
            event = "project.vanished",
            project_id = %fixture.project_id,
            "project removed by the server during settings load; provisioning again"
        );
        let again = self
            .provision(&fixture.project_id, Some(&fixture.branch))
            .await?;
        self.await_settings_applied(&again.project_id).await
    }

    /// Wait until `build_type_id` has exactly `expected` parameters.
    pub async fn await_build_type_param_count(
        &self,
        build_type_id: &str,
        expected: u32,
        policy: WaitPolicy,
    ) -> Result<ParametersDto> {
        let api = self.api.clone();
        let id = build_type_id.to_string();
        let outcome = self
            .waiter
            .wait_until(
                &format!("parameters of {build_type_id} to number {expected}"),
                policy,
                move || {
                    let api = api.clone();
                    let id = id.clone();
                    async move {
                        api.build_type_parameters(&id)
                            .await
                            .map_err(VsyncError::from)
                    }
                },
                move |params: &ParametersDto| params.effective_count() == expected,
                |_: &ParametersDto| false,
            )
            .await?;

        let label = outcome.label();
        // An abort carries its reason, e.g. the build type is gone.
        let last = if outcome.is_aborted() {
            outcome.last_seen()
        } else {
            outcome
                .last_snapshot()
                .map(|p| p.effective_count().to_string())
                .unwrap_or_else(|| "<never observed>".to_string())
        };
        match outcome {
            WaitOutcome::Converged { snapshot, .. } => Ok(snapshot),
            _ => Err(VsyncError::Assertion {
                what: format!("parameter count of {build_type_id} ({label})"),
                expected: expected.to_string(),
                actual: last,
            }),
        }
    }
}
