use serde::{Deserialize, Serialize};

/// Versioned-settings configuration of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedSettingsConfig {
    pub format: String,
    pub synchronization_mode: String,
    #[serde(rename = "allowUIEditing")]
    pub allow_ui_editing: bool,
    pub store_secure_values_outside_vcs: bool,
    pub portable_dsl: bool,
    pub show_settings_changes: bool,
    pub vcs_root_id: String,
    pub build_settings_mode: String,
    pub import_decision: String,
}

impl VersionedSettingsConfig {
    /// Kotlin DSL, two-way synchronization, settings imported from the
    /// repository on first enable.
    pub fn kotlin_import_from_vcs(vcs_root_id: &str) -> Self {
        VersionedSettingsConfig {
            format: "kotlin".to_string(),
            synchronization_mode: "enabled".to_string(),
            allow_ui_editing: true,
            store_secure_values_outside_vcs: true,
            portable_dsl: true,
            show_settings_changes: true,
            vcs_root_id: vcs_root_id.to_string(),
            build_settings_mode: "alwaysUseCurrent".to_string(),
            import_decision: "importFromVCS".to_string(),
        }
    }
}

/// Body of the versioned-settings status resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedSettingsStatusDto {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}
