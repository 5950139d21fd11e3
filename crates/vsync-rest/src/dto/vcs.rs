use super::parameters::{PropertiesDto, PropertyDto};
use serde::{Deserialize, Serialize};

/// VCS plugin name for git roots.
pub const GIT_VCS_NAME: &str = "jetbrains.git";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVcsRootRequest {
    pub id: String,
    pub name: String,
    pub vcs_name: String,
    pub project: ProjectRef,
    pub properties: PropertiesDto,
}

impl CreateVcsRootRequest {
    /// Git root owned by `project_id`.
    pub fn git(id: &str, name: &str, project_id: &str, properties: Vec<PropertyDto>) -> Self {
        CreateVcsRootRequest {
            id: id.to_string(),
            name: name.to_string(),
            vcs_name: GIT_VCS_NAME.to_string(),
            project: ProjectRef {
                id: project_id.to_string(),
            },
            properties: PropertiesDto { property: properties },
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .property
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsRootDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_root_request_shape() {
        let req = CreateVcsRootRequest::git(
            "dsl_P_git",
            "dsl_P_git",
            "P",
            vec![PropertyDto::new("url", "https://git.example.com/dsl.git")],
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["vcsName"], "jetbrains.git");
        assert_eq!(json["project"]["id"], "P");
        assert_eq!(json["properties"]["property"][0]["name"], "url");
        assert_eq!(req.property("url"), Some("https://git.example.com/dsl.git"));
        assert_eq!(req.property("branch"), None);
    }
}
