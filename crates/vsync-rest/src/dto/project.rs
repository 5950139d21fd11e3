use serde::{Deserialize, Serialize};

/// Identifier of the server's top-level project.
pub const ROOT_PROJECT_ID: &str = "_Root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsDto {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub project: Vec<ProjectDto>,
}

impl ProjectsDto {
    /// Project ids starting with `prefix`.
    pub fn ids_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.project
            .iter()
            .map(|p| p.id.as_str())
            .filter(move |id| id.starts_with(prefix))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLocator {
    pub locator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub parent_project: ParentLocator,
    pub name: String,
    pub id: String,
    pub copy_all_associated_settings: bool,
}

impl CreateProjectRequest {
    /// A fresh project directly under the root project.
    pub fn under_root(id: &str, name: &str) -> Self {
        CreateProjectRequest {
            parent_project: ParentLocator {
                locator: format!("id:{ROOT_PROJECT_ID}"),
            },
            name: name.to_string(),
            id: id.to_string(),
            copy_all_associated_settings: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypeDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypesDto {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub build_type: Vec<BuildTypeDto>,
}

impl BuildTypesDto {
    /// Number of build types, preferring the server-reported count.
    pub fn len(&self) -> usize {
        self.count
            .map(|c| c as usize)
            .unwrap_or(self.build_type.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_project_request_shape() {
        let req = CreateProjectRequest::under_root("Vsync_ab12", "Vsync ab12");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["parentProject"]["locator"], "id:_Root");
        assert_eq!(json["copyAllAssociatedSettings"], false);
        assert_eq!(json["id"], "Vsync_ab12");
    }

    #[test]
    fn test_projects_tolerates_missing_array() {
        let dto: ProjectsDto = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert!(dto.project.is_empty());

        let dto: ProjectsDto = serde_json::from_str(
            r#"{"count":3,"project":[{"id":"_Root"},{"id":"Vsync_1","name":"a"},{"id":"Other"}]}"#,
        )
        .unwrap();
        let ids: Vec<_> = dto.ids_with_prefix("Vsync_").collect();
        assert_eq!(ids, vec!["Vsync_1"]);
    }

    #[test]
    fn test_build_types_count() {
        let dto: BuildTypesDto =
            serde_json::from_str(r#"{"buildType":[{"id":"A"},{"id":"B"}]}"#).unwrap();
        assert_eq!(dto.len(), 2);
        let empty = BuildTypesDto::default();
        assert!(empty.is_empty());
    }
}
