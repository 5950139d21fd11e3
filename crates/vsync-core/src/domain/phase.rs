//! Named phases of the versioned-settings status.

use serde::{Deserialize, Serialize};
use std::fmt;
use vsync_rest::StatusSnapshot;

/// A phase the server reports through the status message.
///
/// A snapshot is in a phase when its message contains the phase text,
/// compared case-insensitively. Messages carry timestamps and trailing
/// detail, so exact equality never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingsPhase {
    /// Repository settings were applied to the project.
    AppliedChanges,
    /// The server is executing the settings DSL.
    RunningDsl,
}

impl SettingsPhase {
    pub const fn text(&self) -> &'static str {
        match self {
            SettingsPhase::AppliedChanges => "Changes from VCS are applied to project settings",
            SettingsPhase::RunningDsl => "Running DSL",
        }
    }

    pub fn matches(&self, snapshot: &StatusSnapshot) -> bool {
        snapshot
            .message
            .as_deref()
            .map(|m| m.to_lowercase().contains(&self.text().to_lowercase()))
            .unwrap_or(false)
    }
}

impl fmt::Display for SettingsPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
