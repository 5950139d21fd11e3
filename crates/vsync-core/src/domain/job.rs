//! Build job handles and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use vsync_rest::dto::BuildDto;

/// A queued build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: u64,
    pub build_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    Failure { detail: String },
}

/// Lifecycle of a build as seen by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Finished(JobOutcome),
}

impl JobState {
    /// Map a server build record onto a lifecycle state.
    ///
    /// States other than queued/running/finished (e.g. a deleted build) end
    /// the job as a failure; a finished build is successful only when its
    /// status is `SUCCESS`.
    pub fn from_build(build: &BuildDto) -> Self {
        match build.state.to_ascii_lowercase().as_str() {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "finished" => match build.status.as_deref() {
                Some(status) if status.eq_ignore_ascii_case("SUCCESS") => {
                    JobState::Finished(JobOutcome::Success)
                }
                status => JobState::Finished(JobOutcome::Failure {
                    detail: failure_detail(status.unwrap_or("UNKNOWN"), build),
                }),
            },
            other => JobState::Finished(JobOutcome::Failure {
                detail: failure_detail(&format!("state '{other}'"), build),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Finished(JobOutcome::Success))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Finished(JobOutcome::Failure { .. }))
    }

    pub fn failure_detail(&self) -> Option<&str> {
        match self {
            JobState::Finished(JobOutcome::Failure { detail }) => Some(detail),
            _ => None,
        }
    }
}

fn failure_detail(head: &str, build: &BuildDto) -> String {
    match build.status_text.as_deref() {
        Some(text) if !text.is_empty() => format!("{head}: {text}"),
        _ => head.to_string(),
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Finished(JobOutcome::Success) => write!(f, "finished/SUCCESS"),
            JobState::Finished(JobOutcome::Failure { detail }) => {
                write!(f, "finished/failed ({detail})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(state: &str, status: Option<&str>) -> BuildDto {
        BuildDto::new(1, state, status)
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(JobState::from_build(&build("queued", None)), JobState::Queued);
        assert_eq!(JobState::from_build(&build("running", None)), JobState::Running);
        assert!(JobState::from_build(&build("finished", Some("SUCCESS"))).is_success());

        let failed = JobState::from_build(&build("finished", Some("FAILURE")));
        assert!(failed.is_failure());
        assert_eq!(failed.failure_detail(), Some("FAILURE"));
    }

    #[test]
    fn test_unknown_state_is_failure() {
        let deleted = JobState::from_build(&build("deleted", None));
        assert!(deleted.is_failure());
        assert!(deleted.failure_detail().unwrap().contains("deleted"));
    }

    #[test]
    fn test_failure_detail_includes_status_text() {
        let mut dto = build("finished", Some("FAILURE"));
        dto.status_text = Some("Compilation error".to_string());
        let state = JobState::from_build(&dto);
        assert_eq!(state.failure_detail(), Some("FAILURE: Compilation error"));
        assert!(state.to_string().contains("Compilation error"));
    }
}
