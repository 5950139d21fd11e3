//! HTTP implementation of [`ServerApi`].
//!
//! Requests carry basic-auth credentials and exchange JSON. Credentials
//! never appear in log lines or error messages.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ServerApi;
use crate::dto::*;
use crate::endpoints::Endpoint;
use crate::error::{excerpt, ApiError};
use crate::snapshot::StatusSnapshot;
use crate::ApiResult;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the build server.
#[derive(Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Server base URL, optionally with a context path.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        RestConfig {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Live client for the build server's REST API.
pub struct RestClient {
    base_url: Url,
    username: String,
    password: String,
    http: reqwest::Client,
}

struct RawResponse {
    status: StatusCode,
    body: String,
}

impl RestClient {
    pub fn new(config: &RestConfig) -> ApiResult<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ApiError::InvalidInput(format!("invalid base URL: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidInput(format!(
                "base URL must be http(s), got scheme '{}'",
                base_url.scheme()
            )));
        }
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidInput(format!(
                "base URL cannot carry a path: {base_url}"
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("vsync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        Ok(RestClient {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send<B>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> ApiResult<RawResponse>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = endpoint.resolve(&self.base_url)?;
        let path = endpoint.to_string();
        let transport = |e: reqwest::Error| ApiError::Transport {
            method: method.clone(),
            path: path.clone(),
            message: e.without_url().to_string(),
        };

        let mut request = self
            .http
            .request(method.clone(), url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(method = %method, path = %path, status = status.as_u16(), "rest call");
        Ok(RawResponse { status, body })
    }

    /// Return the body if `status` is one of `accepted`, otherwise the
    /// matching error.
    fn accept(
        method: Method,
        endpoint: &Endpoint,
        response: RawResponse,
        accepted: &[StatusCode],
    ) -> ApiResult<String> {
        if accepted.contains(&response.status) {
            return Ok(response.body);
        }
        let path = endpoint.to_string();
        if response.status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { method, path });
        }
        Err(ApiError::UnexpectedStatus {
            method,
            path,
            status: response.status.as_u16(),
            body: excerpt(&response.body),
        })
    }

    fn decode<T: DeserializeOwned>(endpoint: &Endpoint, body: &str) -> ApiResult<T> {
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            path: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, endpoint, None).await?;
        let body = Self::accept(Method::GET, endpoint, response, &[StatusCode::OK])?;
        Self::decode(endpoint, &body)
    }
}

#[async_trait]
impl ServerApi for RestClient {
    async fn find_project(&self, project_id: &str) -> ApiResult<Option<ProjectDto>> {
        let endpoint = Endpoint::project(project_id);
        let response = self.send::<()>(Method::GET, &endpoint, None).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::accept(Method::GET, &endpoint, response, &[StatusCode::OK])?;
        Self::decode(&endpoint, &body).map(Some)
    }

    async fn list_projects(&self) -> ApiResult<ProjectsDto> {
        self.get_json(&Endpoint::projects()).await
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> ApiResult<ProjectDto> {
        let endpoint = Endpoint::projects();
        let response = self.send(Method::POST, &endpoint, Some(request)).await?;
        let body = Self::accept(
            Method::POST,
            &endpoint,
            response,
            &[StatusCode::OK, StatusCode::CREATED],
        )?;
        Self::decode(&endpoint, &body)
    }

    async fn delete_project(&self, project_id: &str) -> ApiResult<()> {
        let endpoint = Endpoint::project(project_id);
        let response = self.send::<()>(Method::DELETE, &endpoint, None).await?;
        Self::accept(
            Method::DELETE,
            &endpoint,
            response,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
        )?;
        Ok(())
    }

    async fn project_build_types(&self, project_id: &str) -> ApiResult<BuildTypesDto> {
        self.get_json(&Endpoint::project_build_types(project_id))
            .await
    }

    async fn create_vcs_root(&self, request: &CreateVcsRootRequest) -> ApiResult<String> {
        let endpoint = Endpoint::vcs_roots();
        let response = self.send(Method::POST, &endpoint, Some(request)).await?;
        let body = Self::accept(
            Method::POST,
            &endpoint,
            response,
            &[StatusCode::OK, StatusCode::CREATED],
        )?;
        let created: VcsRootDto = Self::decode(&endpoint, &body)?;
        Ok(created.id)
    }

    async fn put_versioned_settings_config(
        &self,
        project_id: &str,
        config: &VersionedSettingsConfig,
    ) -> ApiResult<()> {
        let endpoint = Endpoint::versioned_settings_config(project_id);
        let response = self.send(Method::PUT, &endpoint, Some(config)).await?;
        Self::accept(
            Method::PUT,
            &endpoint,
            response,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
        )?;
        Ok(())
    }

    async fn load_versioned_settings(&self, project_id: &str) -> ApiResult<()> {
        let endpoint = Endpoint::versioned_settings_load(project_id);
        let empty = EmptyBody {};
        let response = self.send(Method::POST, &endpoint, Some(&empty)).await?;
        Self::accept(
            Method::POST,
            &endpoint,
            response,
            &[StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT],
        )?;
        Ok(())
    }

    async fn versioned_settings_status(&self, project_id: &str) -> ApiResult<StatusSnapshot> {
        let endpoint = Endpoint::versioned_settings_status(project_id);
        let response = self.send::<()>(Method::GET, &endpoint, None).await?;
        StatusSnapshot::from_response(
            &endpoint.to_string(),
            response.status.as_u16(),
            &response.body,
        )
    }

    async fn queue_build(&self, request: &QueueBuildRequest) -> ApiResult<QueuedBuildDto> {
        let endpoint = Endpoint::build_queue();
        let response = self.send(Method::POST, &endpoint, Some(request)).await?;
        let body = Self::accept(Method::POST, &endpoint, response, &[StatusCode::OK])?;
        Self::decode(&endpoint, &body)
    }

    async fn get_build(&self, build_id: u64) -> ApiResult<BuildDto> {
        self.get_json(&Endpoint::build(build_id)).await
    }

    async fn build_type_parameters(&self, build_type_id: &str) -> ApiResult<ParametersDto> {
        self.get_json(&Endpoint::build_type_parameters(build_type_id))
            .await
    }

    async fn connected_agents(&self) -> ApiResult<AgentsDto> {
        self.get_json(&Endpoint::agents()).await
    }
}

#[derive(Serialize, Deserialize)]
struct EmptyBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_base_urls() {
        let err = RestClient::new(&RestConfig::new("not a url", "u", "p"))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = RestClient::new(&RestConfig::new("ftp://ci.example.com", "u", "p"))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_config_debug_hides_password() {
        let config = RestConfig::new("https://ci.example.com", "admin", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_accepts_context_path() {
        let client = RestClient::new(
            &RestConfig::new("https://ci.example.com/tc", "u", "p")
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url().path(), "/tc");
    }
}
