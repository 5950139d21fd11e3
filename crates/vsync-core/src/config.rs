//! Harness configuration, read once from the environment.
//!
//! All variables use the `VSYNC_` prefix. [`HarnessConfig::from_lookup`]
//! takes any key lookup so tests never touch the process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use vsync_rest::{RestConfig, Url};

use crate::domain::{BranchRef, Result, VsyncError};
use crate::git::RemoteRepo;
use crate::naming::DEFAULT_BRANCH_PREFIX;

pub const DEFAULT_SYNC_FILE: &str = ".teamcity/patches/buildTypes/Build.kts";
pub const DEFAULT_BRANCH: &str = "refs/heads/main";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BASE_PARAMETER_COUNT: u32 = 4;

/// A value that never prints.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: &str) -> Self {
        Secret(value.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_empty() { "<empty>" } else { "***" })
    }
}

/// How the server authenticates against the settings repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsAuthMethod {
    Password,
    Anonymous,
}

impl VcsAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsAuthMethod::Password => "PASSWORD",
            VcsAuthMethod::Anonymous => "ANONYMOUS",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PASSWORD" => Ok(VcsAuthMethod::Password),
            "ANONYMOUS" => Ok(VcsAuthMethod::Anonymous),
            other => Err(VsyncError::Config(format!(
                "VSYNC_VCS_AUTH_METHOD must be PASSWORD or ANONYMOUS, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub base_url: String,
    pub username: String,
    pub password: Secret,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RepoSettings {
    pub url: String,
    pub default_branch: BranchRef,
    pub auth_method: VcsAuthMethod,
    pub username: String,
    pub token: Secret,
}

/// Everything a harness run needs to know about its environment.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub server: ServerSettings,
    pub repo: RepoSettings,
    /// Base id for generated projects; also the project `build-usability`
    /// expects to exist.
    pub project_id: String,
    pub compile_build_type: Option<String>,
    /// Repository-relative file rewritten by sync scenarios.
    pub sync_file: PathBuf,
    /// Replacement content for `sync_file`.
    pub sync_content_file: Option<PathBuf>,
    /// Parameter count of the build type before the sync change.
    pub base_parameter_count: u32,
    pub branch_prefix: String,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            optional(key).ok_or_else(|| VsyncError::Config(format!("{key} is required")))
        };

        let http_timeout_secs = match optional("VSYNC_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                VsyncError::Config(format!(
                    "VSYNC_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        let base_parameter_count = match optional("VSYNC_BASE_PARAM_COUNT") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                VsyncError::Config(format!(
                    "VSYNC_BASE_PARAM_COUNT must be a non-negative integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_BASE_PARAMETER_COUNT,
        };
        let auth_method = match optional("VSYNC_VCS_AUTH_METHOD") {
            Some(raw) => VcsAuthMethod::parse(&raw)?,
            None => VcsAuthMethod::Password,
        };
        let default_branch = BranchRef::parse(
            &optional("VSYNC_DSL_REPO_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        )
        .map_err(|e| VsyncError::Config(format!("VSYNC_DSL_REPO_BRANCH: {e}")))?;

        let config = HarnessConfig {
            server: ServerSettings {
                base_url: required("VSYNC_BASE_URL")?,
                username: required("VSYNC_USERNAME")?,
                password: Secret::new(&required("VSYNC_PASSWORD")?),
                http_timeout: Duration::from_secs(http_timeout_secs),
            },
            repo: RepoSettings {
                url: required("VSYNC_DSL_REPO_URL")?,
                default_branch,
                auth_method,
                username: optional("VSYNC_VCS_USERNAME").unwrap_or_else(|| "git".to_string()),
                token: Secret::new(&optional("VSYNC_VCS_TOKEN").unwrap_or_default()),
            },
            project_id: required("VSYNC_PROJECT_ID")?,
            compile_build_type: optional("VSYNC_COMPILE_BUILD_TYPE"),
            sync_file: PathBuf::from(
                optional("VSYNC_SYNC_FILE").unwrap_or_else(|| DEFAULT_SYNC_FILE.to_string()),
            ),
            sync_content_file: optional("VSYNC_SYNC_CONTENT_FILE").map(PathBuf::from),
            base_parameter_count,
            branch_prefix: optional("VSYNC_BRANCH_PREFIX")
                .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server.base_url)
            .map_err(|e| VsyncError::Config(format!("VSYNC_BASE_URL is not a valid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VsyncError::Config(format!(
                "VSYNC_BASE_URL must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.server.http_timeout.is_zero() {
            return Err(VsyncError::Config(
                "VSYNC_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if !self
            .project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
            || !self.project_id.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            return Err(VsyncError::Config(format!(
                "VSYNC_PROJECT_ID must be a letter followed by letters, digits or '_': '{}'",
                self.project_id
            )));
        }
        self.remote_repo()?;
        Ok(())
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig::new(
            &self.server.base_url,
            &self.server.username,
            self.server.password.expose(),
        )
        .with_timeout(self.server.http_timeout)
    }

    pub fn remote_repo(&self) -> Result<RemoteRepo> {
        RemoteRepo::new(
            &self.repo.url,
            &self.repo.username,
            Some(self.repo.token.expose()),
        )
    }
}
