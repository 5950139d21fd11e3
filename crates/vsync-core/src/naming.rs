//! Random identifiers for projects and temporary branches.

use uuid::Uuid;

use crate::domain::{BranchRef, Result};

/// Default prefix of temporary branches.
pub const DEFAULT_BRANCH_PREFIX: &str = "vsync-tmp-";

/// `len` lowercase hex characters (at most 32) from a v4 UUID.
pub fn random_hex(len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..len.min(hex.len())].to_string()
}

/// A project id unique per run: `<base>_<12 hex>`.
pub fn unique_project_id(base: &str) -> String {
    format!("{base}_{}", random_hex(12))
}

/// A fresh temporary branch name: `<prefix><16 hex>`.
pub fn temp_branch(prefix: &str) -> Result<BranchRef> {
    BranchRef::parse(&format!("{prefix}{}", random_hex(16)))
}
