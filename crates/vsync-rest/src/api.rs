//! The remote resource seam.
//!
//! `ServerApi` is implemented by [`crate::client::RestClient`] against a live
//! server and by [`crate::fakes::FakeServer`] in tests. Every method issues
//! at most one request, never retries, and fails fast on a status the
//! operation does not accept. Retrying is the waiter's job.

use async_trait::async_trait;
use reqwest::Method;

use crate::dto::*;
use crate::endpoints::Endpoint;
use crate::error::ApiError;
use crate::snapshot::StatusSnapshot;
use crate::ApiResult;

#[async_trait]
pub trait ServerApi: Send + Sync {
    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Fetch a project; `Ok(None)` when the server answers 404.
    async fn find_project(&self, project_id: &str) -> ApiResult<Option<ProjectDto>>;

    /// Fetch a project that must exist.
    async fn get_project(&self, project_id: &str) -> ApiResult<ProjectDto> {
        self.find_project(project_id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                method: Method::GET,
                path: Endpoint::project(project_id).to_string(),
            })
    }

    async fn list_projects(&self) -> ApiResult<ProjectsDto>;

    async fn create_project(&self, request: &CreateProjectRequest) -> ApiResult<ProjectDto>;

    /// Delete a project. Accepts 200 and 204.
    async fn delete_project(&self, project_id: &str) -> ApiResult<()>;

    async fn project_build_types(&self, project_id: &str) -> ApiResult<BuildTypesDto>;

    // -----------------------------------------------------------------------
    // VCS roots & versioned settings
    // -----------------------------------------------------------------------

    /// Create a VCS root and return the id the server assigned.
    async fn create_vcs_root(&self, request: &CreateVcsRootRequest) -> ApiResult<String>;

    async fn put_versioned_settings_config(
        &self,
        project_id: &str,
        config: &VersionedSettingsConfig,
    ) -> ApiResult<()>;

    /// Ask the server to load settings from the repository.
    async fn load_versioned_settings(&self, project_id: &str) -> ApiResult<()>;

    /// One observation of the versioned-settings status. A missing project
    /// yields a snapshot with `raw_code == 404`.
    async fn versioned_settings_status(&self, project_id: &str) -> ApiResult<StatusSnapshot>;

    // -----------------------------------------------------------------------
    // Builds & parameters
    // -----------------------------------------------------------------------

    async fn queue_build(&self, request: &QueueBuildRequest) -> ApiResult<QueuedBuildDto>;

    /// Fetch a build; unknown ids are `ApiError::NotFound`.
    async fn get_build(&self, build_id: u64) -> ApiResult<BuildDto>;

    async fn build_type_parameters(&self, build_type_id: &str) -> ApiResult<ParametersDto>;

    /// Agents able to run builds right now.
    async fn connected_agents(&self) -> ApiResult<AgentsDto>;
}
