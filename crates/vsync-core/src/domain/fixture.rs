//! Branch references and provisioned fixtures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, VsyncError};

const HEADS: &str = "refs/heads/";

/// A git branch, stored in its fully qualified `refs/heads/...` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchRef(String);

impl BranchRef {
    /// Accept either `main` or `refs/heads/main`.
    pub fn parse(input: &str) -> Result<Self> {
        let short = input.trim().strip_prefix(HEADS).unwrap_or(input.trim());
        let invalid = short.is_empty()
            || short.starts_with('-')
            || short.starts_with('/')
            || short.ends_with('/')
            || short.ends_with(".lock")
            || short.contains("..")
            || short.contains("@{")
            || short
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));
        if invalid {
            return Err(VsyncError::InvalidInput(format!(
                "not a valid branch name: '{input}'"
            )));
        }
        Ok(BranchRef(format!("{HEADS}{short}")))
    }

    pub fn full(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[HEADS.len()..]
    }

    /// Remote-tracking name in a working copy (`origin/<short>`).
    pub fn remote_tracking(&self) -> String {
        format!("origin/{}", self.short())
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A branch created by a fixture scope and owed a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransientBranch {
    pub branch: BranchRef,
    pub source: BranchRef,
    pub created_at: DateTime<Utc>,
}

/// A server project wired to a settings repository branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFixture {
    pub project_id: String,
    pub project_name: String,
    pub vcs_root_id: String,
    pub branch: BranchRef,
}
