//! Wire shapes exchanged with the build server.
//!
//! Field names follow the server's camelCase JSON. Collection wrappers
//! tolerate missing arrays because the server omits empty ones.

pub mod agent;
pub mod build;
pub mod parameters;
pub mod project;
pub mod settings;
pub mod vcs;

pub use agent::{AgentDto, AgentsDto};
pub use build::{BuildDto, BuildTypeRef, QueueBuildRequest, QueuedBuildDto};
pub use parameters::{ParametersDto, PropertiesDto, PropertyDto};
pub use project::{
    BuildTypeDto, BuildTypesDto, CreateProjectRequest, ParentLocator, ProjectDto, ProjectsDto,
    ROOT_PROJECT_ID,
};
pub use settings::{VersionedSettingsConfig, VersionedSettingsStatusDto};
pub use vcs::{CreateVcsRootRequest, ProjectRef, VcsRootDto, GIT_VCS_NAME};
