//! Built-in end-to-end scenarios.

use async_trait::async_trait;

use crate::config::HarnessConfig;
use crate::domain::{Result, VsyncError};
use crate::fixtures::ContentSource;
use crate::scenario::{Scenario, ScenarioContext};

/// Build type every settings repository under test defines, relative to
/// the project id.
pub const SYNC_BUILD_TYPE_SUFFIX: &str = "Build";

pub fn sync_build_type_id(project_id: &str) -> String {
    format!("{project_id}_{SYNC_BUILD_TYPE_SUFFIX}")
}

/// All built-in scenarios in their canonical order.
pub fn builtin_scenarios(config: &HarnessConfig) -> Vec<Box<dyn Scenario>> {
    scenario_set(VcsSync::from_config(config))
}

/// Built-in scenarios for listing, without any configuration.
pub fn catalog() -> Vec<Box<dyn Scenario>> {
    scenario_set(VcsSync { content: None })
}

fn scenario_set(sync: VcsSync) -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(ImportDsl),
        Box::new(LoadAfterImport),
        Box::new(sync),
        Box::new(BuildUsability),
    ]
}

pub fn find_scenario(name: &str, config: &HarnessConfig) -> Option<Box<dyn Scenario>> {
    builtin_scenarios(config)
        .into_iter()
        .find(|s| s.name() == name)
}

// ---------------------------------------------------------------------------
// import-dsl
// ---------------------------------------------------------------------------

pub struct ImportDsl;

#[async_trait]
impl Scenario for ImportDsl {
    fn name(&self) -> &'static str {
        "import-dsl"
    }

    fn description(&self) -> &'static str {
        "Create a project with versioned settings and check the repository settings were imported"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let fixture = ctx.actions.provision_and_import(&ctx.project_id, None).await?;
        ctx.assertions
            .project_exists(&fixture.project_id, Some(&fixture.project_name))
            .await?;
        ctx.assertions
            .build_types_imported(&fixture.project_id)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// load-after-import
// ---------------------------------------------------------------------------

pub struct LoadAfterImport;

#[async_trait]
impl Scenario for LoadAfterImport {
    fn name(&self) -> &'static str {
        "load-after-import"
    }

    fn description(&self) -> &'static str {
        "Import settings, trigger an explicit load and check the project survives it"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let fixture = ctx.actions.provision_and_import(&ctx.project_id, None).await?;
        ctx.assertions
            .build_types_imported(&fixture.project_id)
            .await?;

        ctx.actions.load_settings_tolerant(&fixture).await?;
        ctx.assertions
            .project_exists(&fixture.project_id, Some(&fixture.project_name))
            .await?;
        ctx.assertions
            .build_types_imported(&fixture.project_id)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// vcs-sync
// ---------------------------------------------------------------------------

/// Push a change to a temporary branch and check the server picks it up:
/// the replacement file drops one parameter from the synced build type.
pub struct VcsSync {
    content: Option<ContentSource>,
}

impl VcsSync {
    pub fn new(content: ContentSource) -> Self {
        VcsSync {
            content: Some(content),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        VcsSync {
            content: config.sync_content_file.clone().map(ContentSource::File),
        }
    }
}

#[async_trait]
impl Scenario for VcsSync {
    fn name(&self) -> &'static str {
        "vcs-sync"
    }

    fn description(&self) -> &'static str {
        "Push a settings change to a temporary branch and wait for the server to apply it"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let content = self.content.as_ref().ok_or_else(|| {
            VsyncError::Config("VSYNC_SYNC_CONTENT_FILE is required for vcs-sync".to_string())
        })?;
        let base = ctx.config.base_parameter_count;
        let expected = base.checked_sub(1).ok_or_else(|| {
            VsyncError::Config("VSYNC_BASE_PARAM_COUNT must be at least 1 for vcs-sync".to_string())
        })?;

        let source = ctx.config.repo.default_branch.clone();
        let temp = ctx.fixtures.create_branch_from(&source).await?;

        let fixture = ctx
            .actions
            .provision_and_import(&ctx.project_id, Some(&temp.branch))
            .await?;
        let build_type = sync_build_type_id(&fixture.project_id);
        ctx.assertions.parameter_count(&build_type, base).await?;

        ctx.fixtures.push_change(&temp.branch, content).await?;
        ctx.actions
            .await_settings_applied(&fixture.project_id)
            .await?;
        ctx.actions.load_settings_tolerant(&fixture).await?;

        let policy = ctx.actions.parameter_policy();
        ctx.actions
            .await_build_type_param_count(&build_type, expected, policy)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// build-usability
// ---------------------------------------------------------------------------

/// Works on the configured project, not a generated one.
pub struct BuildUsability;

#[async_trait]
impl Scenario for BuildUsability {
    fn name(&self) -> &'static str {
        "build-usability"
    }

    fn description(&self) -> &'static str {
        "Check the configured project has build types and agents, then run its compile build"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let project_id = ctx.config.project_id.clone();
        ctx.assertions.project_exists(&project_id, None).await?;
        ctx.assertions.build_types_imported(&project_id).await?;
        let agents = ctx.assertions.agents_available().await?;
        tracing::debug!(agents = agents.len(), "agents connected");

        let build_type = ctx.config.compile_build_type.clone().ok_or_else(|| {
            VsyncError::Config(
                "VSYNC_COMPILE_BUILD_TYPE is required for build-usability".to_string(),
            )
        })?;
        let job = ctx
            .builds
            .queue_and_await_success(&build_type, ctx.build_policy())
            .await?;
        tracing::info!(event = "build.usable", build_id = job.id, build_type = %job.build_type);
        Ok(())
    }
}
