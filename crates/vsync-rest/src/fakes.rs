//! In-memory fake build server (testing only)
//!
//! `FakeServer` keeps projects, VCS roots, settings, builds and parameters
//! in a `Mutex`-guarded state and lets tests script the sequences a real
//! server would produce over time: status messages, build progressions,
//! parameter counts and injected faults. One connected agent is present
//! unless a test replaces the agent list.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;

use crate::api::ServerApi;
use crate::dto::*;
use crate::endpoints::Endpoint;
use crate::error::ApiError;
use crate::snapshot::StatusSnapshot;
use crate::ApiResult;

/// Message the fake reports once settings were applied.
pub const APPLIED_MESSAGE: &str = "Changes from VCS are applied to project settings";

/// Operations of the fake, used for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    FindProject,
    ListProjects,
    CreateProject,
    DeleteProject,
    BuildTypes,
    CreateVcsRoot,
    PutSettingsConfig,
    LoadSettings,
    SettingsStatus,
    QueueBuild,
    GetBuild,
    BuildTypeParameters,
    ConnectedAgents,
}

/// A failure the fake answers with instead of serving the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Transport,
    Status(u16),
    NotFound,
    Garbled,
}

impl Fault {
    fn into_error(self, method: Method, path: String) -> ApiError {
        match self {
            Fault::Transport => ApiError::Transport {
                method,
                path,
                message: "connection reset by fake".to_string(),
            },
            Fault::Status(status) => ApiError::UnexpectedStatus {
                method,
                path,
                status,
                body: "fault injected".to_string(),
            },
            Fault::NotFound => ApiError::NotFound { method, path },
            Fault::Garbled => ApiError::Decode {
                path,
                message: "expected value at line 1 column 1".to_string(),
            },
        }
    }
}

/// One scripted answer of the versioned-settings status resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusStep {
    Message(String),
    Missing,
    Fault(Fault),
}

impl StatusStep {
    pub fn message(text: &str) -> Self {
        StatusStep::Message(text.to_string())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    projects: BTreeMap<String, ProjectDto>,
    build_types: HashMap<String, Vec<BuildTypeDto>>,
    vcs_roots: BTreeMap<String, CreateVcsRootRequest>,
    settings: HashMap<String, VersionedSettingsConfig>,
    status_script: HashMap<String, VecDeque<StatusStep>>,
    /// Build types each project gains once its settings are configured.
    imported_build_types: Vec<String>,
    remove_project_on_load: bool,
    build_scripts: VecDeque<Vec<BuildDto>>,
    builds: HashMap<u64, VecDeque<BuildDto>>,
    next_build_id: u64,
    parameter_script: HashMap<String, VecDeque<u32>>,
    parameters: HashMap<String, u32>,
    agents: Vec<AgentDto>,
    faults: HashMap<FakeOp, VecDeque<Fault>>,
    calls: Vec<(FakeOp, String)>,
}

/// Scriptable in-memory stand-in for the build server.
#[derive(Debug)]
pub struct FakeServer {
    state: Mutex<FakeState>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        let mut state = FakeState {
            next_build_id: 1,
            ..FakeState::default()
        };
        state.projects.insert(
            ROOT_PROJECT_ID.to_string(),
            ProjectDto {
                id: ROOT_PROJECT_ID.to_string(),
                name: Some("<Root project>".to_string()),
                parent_project_id: None,
                web_url: None,
            },
        );
        state.agents.push(AgentDto {
            id: 1,
            name: Some("fake-agent-1".to_string()),
        });
        FakeServer {
            state: Mutex::new(state),
        }
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_project(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.projects.insert(
            id.to_string(),
            ProjectDto {
                id: id.to_string(),
                name: Some(name.to_string()),
                parent_project_id: Some(ROOT_PROJECT_ID.to_string()),
                web_url: None,
            },
        );
    }

    pub fn has_project(&self, id: &str) -> bool {
        self.state.lock().unwrap().projects.contains_key(id)
    }

    /// Build types every project receives when its settings get configured.
    pub fn set_imported_build_types(&self, ids: &[&str]) {
        self.state.lock().unwrap().imported_build_types =
            ids.iter().map(|s| s.to_string()).collect();
    }

    /// Make the next settings load delete the project, as some servers do
    /// while re-importing.
    pub fn remove_project_on_next_load(&self) {
        self.state.lock().unwrap().remove_project_on_load = true;
    }

    /// Queue status answers for a project. When the script runs dry the
    /// fake reports [`APPLIED_MESSAGE`] for configured projects and 404
    /// for missing ones.
    pub fn script_status(&self, project_id: &str, steps: Vec<StatusStep>) {
        self.state
            .lock()
            .unwrap()
            .status_script
            .entry(project_id.to_string())
            .or_default()
            .extend(steps);
    }

    /// Progression for the next queued build; the last entry repeats.
    /// `(state, status)` pairs like `("finished", Some("SUCCESS"))`.
    pub fn script_next_build(&self, progression: &[(&str, Option<&str>)]) {
        let steps = progression
            .iter()
            .map(|(state, status)| BuildDto::new(0, state, *status))
            .collect();
        self.state.lock().unwrap().build_scripts.push_back(steps);
    }

    pub fn set_parameter_count(&self, build_type_id: &str, count: u32) {
        self.state
            .lock()
            .unwrap()
            .parameters
            .insert(build_type_id.to_string(), count);
    }

    /// Parameter counts served one per call before settling on the last.
    pub fn script_parameter_counts(&self, build_type_id: &str, counts: &[u32]) {
        self.state
            .lock()
            .unwrap()
            .parameter_script
            .entry(build_type_id.to_string())
            .or_default()
            .extend(counts.iter().copied());
    }

    /// Replace the connected agents with `(id, name)` pairs.
    pub fn set_agents(&self, agents: &[(u64, &str)]) {
        self.state.lock().unwrap().agents = agents
            .iter()
            .map(|(id, name)| AgentDto {
                id: *id,
                name: Some(name.to_string()),
            })
            .collect();
    }

    /// Answer the next `times` calls of `op` with `fault`.
    pub fn inject_fault(&self, op: FakeOp, fault: Fault, times: usize) {
        let mut state = self.state.lock().unwrap();
        let queue = state.faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(fault.clone());
        }
    }

    // -- inspection ---------------------------------------------------------

    pub fn call_count(&self, op: FakeOp) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .count()
    }

    /// Every call in order as `(op, subject)`.
    pub fn calls(&self) -> Vec<(FakeOp, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn vcs_root(&self, id: &str) -> Option<CreateVcsRootRequest> {
        self.state.lock().unwrap().vcs_roots.get(id).cloned()
    }

    pub fn settings_config(&self, project_id: &str) -> Option<VersionedSettingsConfig> {
        self.state.lock().unwrap().settings.get(project_id).cloned()
    }

    // -- internals ----------------------------------------------------------

    /// Record the call and pop a pending fault for it.
    fn enter(
        &self,
        state: &mut FakeState,
        op: FakeOp,
        method: Method,
        endpoint: &Endpoint,
        subject: &str,
    ) -> ApiResult<()> {
        state.calls.push((op, subject.to_string()));
        endpoint.validate()?;
        match state.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(fault) => Err(fault.into_error(method, endpoint.to_string())),
            None => Ok(()),
        }
    }

    fn not_found(method: Method, endpoint: &Endpoint) -> ApiError {
        ApiError::NotFound {
            method,
            path: endpoint.to_string(),
        }
    }

    fn remove_project(state: &mut FakeState, project_id: &str) {
        state.projects.remove(project_id);
        state.build_types.remove(project_id);
        state.settings.remove(project_id);
        state
            .vcs_roots
            .retain(|_, root| root.project.id != project_id);
    }
}

#[async_trait]
impl ServerApi for FakeServer {
    async fn find_project(&self, project_id: &str) -> ApiResult<Option<ProjectDto>> {
        let endpoint = Endpoint::project(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, FakeOp::FindProject, Method::GET, &endpoint, project_id)?;
        Ok(state.projects.get(project_id).cloned())
    }

    async fn list_projects(&self) -> ApiResult<ProjectsDto> {
        let endpoint = Endpoint::projects();
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, FakeOp::ListProjects, Method::GET, &endpoint, "")?;
        let project: Vec<ProjectDto> = state.projects.values().cloned().collect();
        Ok(ProjectsDto {
            count: Some(project.len() as u32),
            project,
        })
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> ApiResult<ProjectDto> {
        let endpoint = Endpoint::projects();
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::CreateProject,
            Method::POST,
            &endpoint,
            &request.id,
        )?;
        if state.projects.contains_key(&request.id) {
            return Err(ApiError::UnexpectedStatus {
                method: Method::POST,
                path: endpoint.to_string(),
                status: 400,
                body: format!("Project with id '{}' already exists", request.id),
            });
        }
        let parent = request
            .parent_project
            .locator
            .strip_prefix("id:")
            .unwrap_or(&request.parent_project.locator)
            .to_string();
        let project = ProjectDto {
            id: request.id.clone(),
            name: Some(request.name.clone()),
            parent_project_id: Some(parent),
            web_url: None,
        };
        state.projects.insert(request.id.clone(), project.clone());
        Ok(project)
    }

    async fn delete_project(&self, project_id: &str) -> ApiResult<()> {
        let endpoint = Endpoint::project(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::DeleteProject,
            Method::DELETE,
            &endpoint,
            project_id,
        )?;
        if !state.projects.contains_key(project_id) {
            return Err(Self::not_found(Method::DELETE, &endpoint));
        }
        Self::remove_project(&mut state, project_id);
        Ok(())
    }

    async fn project_build_types(&self, project_id: &str) -> ApiResult<BuildTypesDto> {
        let endpoint = Endpoint::project_build_types(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, FakeOp::BuildTypes, Method::GET, &endpoint, project_id)?;
        if !state.projects.contains_key(project_id) {
            return Err(Self::not_found(Method::GET, &endpoint));
        }
        let build_type = state
            .build_types
            .get(project_id)
            .cloned()
            .unwrap_or_default();
        Ok(BuildTypesDto {
            count: Some(build_type.len() as u32),
            build_type,
        })
    }

    async fn create_vcs_root(&self, request: &CreateVcsRootRequest) -> ApiResult<String> {
        let endpoint = Endpoint::vcs_roots();
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::CreateVcsRoot,
            Method::POST,
            &endpoint,
            &request.id,
        )?;
        if !state.projects.contains_key(&request.project.id) {
            return Err(ApiError::UnexpectedStatus {
                method: Method::POST,
                path: endpoint.to_string(),
                status: 400,
                body: format!("No project found by locator 'id:{}'", request.project.id),
            });
        }
        state
            .vcs_roots
            .insert(request.id.clone(), request.clone());
        Ok(request.id.clone())
    }

    async fn put_versioned_settings_config(
        &self,
        project_id: &str,
        config: &VersionedSettingsConfig,
    ) -> ApiResult<()> {
        let endpoint = Endpoint::versioned_settings_config(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::PutSettingsConfig,
            Method::PUT,
            &endpoint,
            project_id,
        )?;
        if !state.projects.contains_key(project_id) {
            return Err(Self::not_found(Method::PUT, &endpoint));
        }
        if !state.vcs_roots.contains_key(&config.vcs_root_id) {
            return Err(ApiError::UnexpectedStatus {
                method: Method::PUT,
                path: endpoint.to_string(),
                status: 400,
                body: format!("No VCS root found by id '{}'", config.vcs_root_id),
            });
        }
        state
            .settings
            .insert(project_id.to_string(), config.clone());
        let imported: Vec<BuildTypeDto> = state
            .imported_build_types
            .iter()
            .map(|suffix| BuildTypeDto {
                id: format!("{project_id}_{suffix}"),
                name: Some(suffix.clone()),
                project_id: Some(project_id.to_string()),
            })
            .collect();
        state.build_types.insert(project_id.to_string(), imported);
        Ok(())
    }

    async fn load_versioned_settings(&self, project_id: &str) -> ApiResult<()> {
        let endpoint = Endpoint::versioned_settings_load(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::LoadSettings,
            Method::POST,
            &endpoint,
            project_id,
        )?;
        if !state.projects.contains_key(project_id) {
            return Err(Self::not_found(Method::POST, &endpoint));
        }
        if std::mem::take(&mut state.remove_project_on_load) {
            Self::remove_project(&mut state, project_id);
        }
        Ok(())
    }

    async fn versioned_settings_status(&self, project_id: &str) -> ApiResult<StatusSnapshot> {
        let endpoint = Endpoint::versioned_settings_status(project_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::SettingsStatus,
            Method::GET,
            &endpoint,
            project_id,
        )?;
        let step = state
            .status_script
            .get_mut(project_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(StatusStep::Message(text)) => Ok(StatusSnapshot::with_message(&text)),
            Some(StatusStep::Missing) => Ok(StatusSnapshot::missing("")),
            Some(StatusStep::Fault(fault)) => {
                Err(fault.into_error(Method::GET, endpoint.to_string()))
            }
            None if !state.projects.contains_key(project_id) => Ok(StatusSnapshot::missing(
                &format!("No project found by locator 'id:{project_id}'"),
            )),
            None if state.settings.contains_key(project_id) => {
                Ok(StatusSnapshot::with_message(APPLIED_MESSAGE))
            }
            None => Ok(StatusSnapshot::with_message(
                "Versioned settings are disabled",
            )),
        }
    }

    async fn queue_build(&self, request: &QueueBuildRequest) -> ApiResult<QueuedBuildDto> {
        let endpoint = Endpoint::build_queue();
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::QueueBuild,
            Method::POST,
            &endpoint,
            &request.build_type.id,
        )?;
        let id = state.next_build_id;
        state.next_build_id += 1;
        let script = state
            .build_scripts
            .pop_front()
            .unwrap_or_else(|| vec![BuildDto::new(0, "finished", Some("SUCCESS"))]);
        let progression = script
            .into_iter()
            .map(|mut b| {
                b.id = id;
                b.build_type_id = Some(request.build_type.id.clone());
                b
            })
            .collect();
        state.builds.insert(id, progression);
        Ok(QueuedBuildDto {
            id,
            state: Some("queued".to_string()),
            build_type_id: Some(request.build_type.id.clone()),
        })
    }

    async fn get_build(&self, build_id: u64) -> ApiResult<BuildDto> {
        let endpoint = Endpoint::build(build_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::GetBuild,
            Method::GET,
            &endpoint,
            &build_id.to_string(),
        )?;
        let progression = state
            .builds
            .get_mut(&build_id)
            .ok_or_else(|| Self::not_found(Method::GET, &endpoint))?;
        let current = if progression.len() > 1 {
            progression.pop_front()
        } else {
            progression.front().cloned()
        };
        current.ok_or_else(|| Self::not_found(Method::GET, &endpoint))
    }

    async fn build_type_parameters(&self, build_type_id: &str) -> ApiResult<ParametersDto> {
        let endpoint = Endpoint::build_type_parameters(build_type_id);
        let mut state = self.state.lock().unwrap();
        self.enter(
            &mut state,
            FakeOp::BuildTypeParameters,
            Method::GET,
            &endpoint,
            build_type_id,
        )?;
        let scripted = match state.parameter_script.get_mut(build_type_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().copied(),
            None => None,
        };
        let count = scripted
            .or_else(|| state.parameters.get(build_type_id).copied())
            .ok_or_else(|| Self::not_found(Method::GET, &endpoint))?;
        Ok(ParametersDto::with_names(
            (0..count).map(|i| format!("param.{i}")),
        ))
    }

    async fn connected_agents(&self) -> ApiResult<AgentsDto> {
        let endpoint = Endpoint::agents();
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, FakeOp::ConnectedAgents, Method::GET, &endpoint, "")?;
        Ok(AgentsDto {
            count: Some(state.agents.len() as u32),
            agent: state.agents.clone(),
        })
    }
}
