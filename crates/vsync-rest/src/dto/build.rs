use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTypeRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBuildRequest {
    pub build_type: BuildTypeRef,
}

impl QueueBuildRequest {
    pub fn for_build_type(build_type_id: &str) -> Self {
        QueueBuildRequest {
            build_type: BuildTypeRef {
                id: build_type_id.to_string(),
            },
        }
    }
}

/// Answer of the build queue after a job was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBuildDto {
    pub id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub build_type_id: Option<String>,
}

/// A build as reported by the builds resource.
///
/// `state` is `queued`, `running` or `finished`; `status` is only
/// meaningful once finished (`SUCCESS`, `FAILURE`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDto {
    pub id: u64,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type_id: Option<String>,
}

impl BuildDto {
    pub fn new(id: u64, state: &str, status: Option<&str>) -> Self {
        BuildDto {
            id,
            state: state.to_string(),
            status: status.map(str::to_string),
            status_text: None,
            build_type_id: None,
        }
    }
}
