//! Checks against server state that fail with `VsyncError::Assertion`.
//!
//! Assertions never panic: a failed check is an error value carrying the
//! expected and actual values, so the scenario runner can still tear down.

use std::sync::Arc;

use vsync_rest::dto::{AgentsDto, BuildTypesDto, ProjectDto};
use vsync_rest::{ServerApi, StatusSnapshot};

use crate::domain::{Result, SettingsPhase, VsyncError};

fn failed(what: impl Into<String>, expected: impl ToString, actual: impl ToString) -> VsyncError {
    VsyncError::Assertion {
        what: what.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[derive(Clone)]
pub struct ServerAssertions {
    api: Arc<dyn ServerApi>,
}

impl ServerAssertions {
    pub fn new(api: Arc<dyn ServerApi>) -> Self {
        ServerAssertions { api }
    }

    /// The project exists, with `expected_name` when given.
    pub async fn project_exists(
        &self,
        project_id: &str,
        expected_name: Option<&str>,
    ) -> Result<ProjectDto> {
        let project = self
            .api
            .find_project(project_id)
            .await?
            .ok_or_else(|| failed(format!("project {project_id}"), "to exist", "404"))?;
        if project.id != project_id {
            return Err(failed("project id", project_id, &project.id));
        }
        if let Some(expected) = expected_name {
            let actual = project.name.as_deref().unwrap_or("<none>");
            if actual != expected {
                return Err(failed(format!("name of project {project_id}"), expected, actual));
            }
        }
        Ok(project)
    }

    /// At least one build type was imported and the listing is consistent.
    pub async fn build_types_imported(&self, project_id: &str) -> Result<BuildTypesDto> {
        let types = self.api.project_build_types(project_id).await?;
        let listed = types.build_type.len();
        let what = format!("build types of {project_id}");

        if listed == 0 {
            return Err(failed(what, "at least one build type", 0));
        }
        if let Some(count) = types.count {
            if count as usize != listed {
                return Err(failed(
                    format!("{what}: listed entries vs reported count"),
                    count,
                    listed,
                ));
            }
        }
        if let Some(blank) = types.build_type.iter().find(|bt| {
            bt.id.trim().is_empty() || bt.name.as_deref().map_or(true, |n| n.trim().is_empty())
        }) {
            return Err(failed(
                format!("{what}: every entry has an id and a name"),
                "non-blank id and name",
                format!("id='{}' name={:?}", bt_id(&blank.id), blank.name),
            ));
        }
        Ok(types)
    }

    /// At least one agent is connected, so a queued build can start.
    pub async fn agents_available(&self) -> Result<AgentsDto> {
        let agents = self.api.connected_agents().await?;
        if agents.is_empty() {
            return Err(failed("connected agents", "at least 1", 0));
        }
        Ok(agents)
    }

    /// One fetch of the parameter list, compared to `expected`.
    pub async fn parameter_count(&self, build_type_id: &str, expected: u32) -> Result<()> {
        let actual = self
            .api
            .build_type_parameters(build_type_id)
            .await?
            .effective_count();
        if actual != expected {
            return Err(failed(
                format!("parameter count of {build_type_id}"),
                expected,
                actual,
            ));
        }
        Ok(())
    }
}

/// The snapshot reports `phase`; otherwise fail with the message seen.
pub fn expect_phase(snapshot: &StatusSnapshot, phase: SettingsPhase) -> Result<()> {
    if phase.matches(snapshot) {
        return Ok(());
    }
    Err(failed("versioned settings status", phase.text(), snapshot.summary()))
}

fn bt_id(id: &str) -> &str {
    if id.is_empty() {
        "<blank>"
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsync_rest::fakes::FakeServer;

    #[tokio::test]
    async fn test_project_exists_checks_name() {
        let fake = Arc::new(FakeServer::new());
        fake.add_project("P", "Project P");
        let asserts = ServerAssertions::new(fake);

        asserts.project_exists("P", Some("Project P")).await.unwrap();
        let err = asserts.project_exists("P", Some("Other")).await.unwrap_err();
        assert!(matches!(err, VsyncError::Assertion { .. }));
        assert!(err.to_string().contains("Project P"));

        let err = asserts.project_exists("Missing", None).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_build_types_must_be_present() {
        let fake = Arc::new(FakeServer::new());
        fake.add_project("P", "P");
        let asserts = ServerAssertions::new(fake);
        let err = asserts.build_types_imported("P").await.unwrap_err();
        assert!(err.to_string().contains("at least one build type"));
    }

    #[tokio::test]
    async fn test_agents_available() {
        let fake = Arc::new(FakeServer::new());
        let asserts = ServerAssertions::new(fake.clone());
        assert_eq!(asserts.agents_available().await.unwrap().len(), 1);

        fake.set_agents(&[]);
        let err = asserts.agents_available().await.unwrap_err();
        assert!(err.to_string().contains("connected agents"));
    }

    #[tokio::test]
    async fn test_parameter_count_mismatch_reports_actual() {
        let fake = Arc::new(FakeServer::new());
        fake.set_parameter_count("P_Build", 3);
        let asserts = ServerAssertions::new(fake);
        asserts.parameter_count("P_Build", 3).await.unwrap();
        let err = asserts.parameter_count("P_Build", 4).await.unwrap_err();
        match err {
            VsyncError::Assertion {
                expected, actual, ..
            } => {
                assert_eq!(expected, "4");
                assert_eq!(actual, "3");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_expect_phase_reports_message() {
        let snap = StatusSnapshot::with_message("Running DSL...");
        let err = expect_phase(&snap, SettingsPhase::AppliedChanges).unwrap_err();
        assert!(err.to_string().contains("Running DSL"));
        expect_phase(&snap, SettingsPhase::RunningDsl).unwrap();
    }
}
