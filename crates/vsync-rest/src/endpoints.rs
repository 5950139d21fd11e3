//! Resource paths under the server's REST root.
//!
//! Every identifier is appended as one opaque path segment, so characters
//! like `/`, `?` or spaces in a project id are percent-encoded instead of
//! changing which resource is addressed.

use crate::error::ApiError;
use crate::ApiResult;
use reqwest::Url;
use std::fmt;

/// Fixed prefix of every REST resource.
pub const REST_ROOT: [&str; 2] = ["app", "rest"];

/// A resource address relative to the REST root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    fn collection(name: &str) -> Self {
        Endpoint {
            segments: vec![name.to_string()],
        }
    }

    fn with(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    fn locator(self, id: &str) -> Self {
        self.with(format!("id:{id}"))
    }

    pub fn projects() -> Self {
        Self::collection("projects")
    }

    pub fn project(project_id: &str) -> Self {
        Self::projects().locator(project_id)
    }

    pub fn project_build_types(project_id: &str) -> Self {
        Self::project(project_id).with("buildTypes")
    }

    pub fn vcs_roots() -> Self {
        Self::collection("vcs-roots")
    }

    pub fn versioned_settings_config(project_id: &str) -> Self {
        Self::project(project_id)
            .with("versionedSettings")
            .with("config")
    }

    pub fn versioned_settings_load(project_id: &str) -> Self {
        Self::project(project_id)
            .with("versionedSettings")
            .with("loadSettings")
    }

    pub fn versioned_settings_status(project_id: &str) -> Self {
        Self::project(project_id)
            .with("versionedSettings")
            .with("status")
    }

    pub fn agents() -> Self {
        Self::collection("agents")
    }

    pub fn build_queue() -> Self {
        Self::collection("buildQueue")
    }

    pub fn build(build_id: u64) -> Self {
        Self::collection("builds").with(format!("id:{build_id}"))
    }

    pub fn build_type_parameters(build_type_id: &str) -> Self {
        Self::collection("buildTypes")
            .locator(build_type_id)
            .with("parameters")
    }

    /// Reject addresses built from empty identifiers (`id:` with nothing
    /// after it would silently address a different resource).
    pub fn validate(&self) -> ApiResult<()> {
        for segment in &self.segments {
            let value = segment.strip_prefix("id:").unwrap_or(segment);
            if value.trim().is_empty() {
                return Err(ApiError::InvalidInput(format!(
                    "empty identifier in resource path {self}"
                )));
            }
        }
        Ok(())
    }

    /// Absolute URL of this resource on the given server.
    pub fn resolve(&self, base: &Url) -> ApiResult<Url> {
        self.validate()?;
        let mut url = base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidInput(format!("base URL cannot carry a path: {base}"))
            })?;
            path.pop_if_empty();
            path.extend(REST_ROOT);
            path.extend(self.segments.iter().map(String::as_str));
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Human-readable path used in logs and errors (not percent-encoded).
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", REST_ROOT.join("/"))?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
