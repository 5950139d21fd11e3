//! Per-run ownership of temporary repository state.
//!
//! A [`FixtureScope`] owns every temporary branch it pushed and every
//! scratch directory it created. Nothing is global: two scopes never see
//! each other's resources, and [`FixtureScope::cleanup_all`] releases
//! exactly what its own scope acquired.
//!
//! Cleanup deletes branches first (a working copy is needed to push the
//! deletions) and directories second. Failures are logged and swallowed so
//! one stuck resource never blocks the rest.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::domain::{BranchRef, Result, TransientBranch, VsyncError};
use crate::git::{RemoteRepo, VcsTransport};
use crate::metrics::METRICS;
use crate::naming::{self, DEFAULT_BRANCH_PREFIX};
use crate::obs;

/// Commit message of every change pushed by a scope.
pub const SYNC_COMMIT_MESSAGE: &str = "[test] repository-to-server sync change (temp branch)";

/// Bytes to write into the synchronized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl ContentSource {
    pub fn text(text: &str) -> Self {
        ContentSource::Inline(text.as_bytes().to_vec())
    }

    pub async fn load(&self) -> Result<Vec<u8>> {
        match self {
            ContentSource::Inline(bytes) => Ok(bytes.clone()),
            ContentSource::File(path) => tokio::fs::read(path).await.map_err(|e| {
                VsyncError::InvalidInput(format!(
                    "cannot read content source {}: {e}",
                    path.display()
                ))
            }),
        }
    }
}

/// What a cleanup pass released and what it had to leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub branches_deleted: Vec<BranchRef>,
    pub branches_leaked: Vec<BranchRef>,
    pub dirs_removed: usize,
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.branches_leaked.is_empty() && self.errors.is_empty()
    }

    fn record_error(&mut self, resource: &str, error: &dyn std::fmt::Display) {
        METRICS.inc_cleanup_errors();
        obs::emit_cleanup_error(resource, error);
        self.errors.push(format!("{resource}: {error}"));
    }
}

/// Temporary branches and scratch directories owned by one test run.
pub struct FixtureScope {
    remote: RemoteRepo,
    transport: Arc<dyn VcsTransport>,
    sync_file: PathBuf,
    branch_prefix: String,
    working_copy: Option<PathBuf>,
    branches: Vec<TransientBranch>,
    workdirs: Vec<TempDir>,
}

impl FixtureScope {
    /// `sync_file` is the repository-relative path that `push_change`
    /// overwrites.
    pub fn new(
        remote: RemoteRepo,
        transport: Arc<dyn VcsTransport>,
        sync_file: impl Into<PathBuf>,
    ) -> Result<Self> {
        let sync_file = sync_file.into();
        validate_relative(&sync_file)?;
        Ok(FixtureScope {
            remote,
            transport,
            sync_file,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            working_copy: None,
            branches: Vec::new(),
            workdirs: Vec::new(),
        })
    }

    pub fn with_branch_prefix(mut self, prefix: &str) -> Self {
        self.branch_prefix = prefix.to_string();
        self
    }

    pub fn remote(&self) -> &RemoteRepo {
        &self.remote
    }

    pub fn sync_file(&self) -> &Path {
        &self.sync_file
    }

    /// Branches pushed and not yet deleted.
    pub fn branches(&self) -> &[TransientBranch] {
        &self.branches
    }

    pub fn working_copy(&self) -> Option<&Path> {
        self.working_copy.as_deref()
    }

    /// A fresh empty directory removed by `cleanup_all`.
    pub fn scratch_dir(&mut self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix("vsync-scratch-").tempdir()?;
        let path = dir.path().to_path_buf();
        self.workdirs.push(dir);
        Ok(path)
    }

    async fn ensure_working_copy(&mut self) -> Result<PathBuf> {
        if let Some(path) = &self.working_copy {
            return Ok(path.clone());
        }
        let dir = tempfile::Builder::new().prefix("vsync-wc-").tempdir()?;
        let path = dir.path().to_path_buf();
        self.workdirs.push(dir);
        self.transport.clone_repo(&self.remote, &path).await?;
        debug!(path = %path.display(), remote = %self.remote.display_url(), "cloned working copy");
        self.working_copy = Some(path.clone());
        Ok(path)
    }

    /// Push a new uniquely named branch at the tip of `source`.
    ///
    /// The branch is registered for deletion only after the push succeeded.
    pub async fn create_branch_from(&mut self, source: &BranchRef) -> Result<TransientBranch> {
        let workdir = self.ensure_working_copy().await?;
        self.transport.fetch_branch(&workdir, source).await?;

        let branch = naming::temp_branch(&self.branch_prefix)?;
        self.transport
            .checkout_branch(&workdir, &branch, &source.remote_tracking())
            .await?;
        self.transport.push_branch(&workdir, &branch).await?;

        let created = TransientBranch {
            branch: branch.clone(),
            source: source.clone(),
            created_at: Utc::now(),
        };
        self.branches.push(created.clone());
        METRICS.inc_branches_created();
        obs::emit_branch_created(branch.full(), source.full());
        Ok(created)
    }

    /// Overwrite the synchronized file on `branch`, commit and push.
    ///
    /// The working copy is reset to the remote tip first, so the commit is
    /// always a fast-forward of what the server sees. A branch missing on
    /// the remote is an error. Returns the pushed commit id.
    pub async fn push_change(
        &mut self,
        branch: &BranchRef,
        content: &ContentSource,
    ) -> Result<String> {
        let bytes = content.load().await?;
        let workdir = self.ensure_working_copy().await?;
        self.transport.fetch_branch(&workdir, branch).await?;
        self.transport
            .checkout_branch(&workdir, branch, &branch.remote_tracking())
            .await?;

        let target = workdir.join(&self.sync_file);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        let commit = self
            .transport
            .commit_all(&workdir, SYNC_COMMIT_MESSAGE)
            .await?;
        self.transport.push_branch(&workdir, branch).await?;
        debug!(
            branch = %branch,
            commit = %commit,
            file = %self.sync_file.display(),
            "pushed change"
        );
        Ok(commit)
    }

    /// Delete every registered branch, then every scratch directory.
    ///
    /// Never fails; problems land in the report and the log. A second call
    /// finds nothing left to do.
    pub async fn cleanup_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        // One at a time: a branch leaves the registry only when its
        // deletion is attempted.
        while !self.branches.is_empty() {
            let owned = self.branches.remove(0);
            let name = owned.branch.full().to_string();
            let deleted = match &self.working_copy {
                Some(workdir) => {
                    self.transport
                        .delete_remote_branch(workdir, &owned.branch)
                        .await
                }
                None => Err(VsyncError::Git(
                    "no working copy left to push the deletion from".to_string(),
                )),
            };
            match deleted {
                Ok(()) => {
                    METRICS.inc_branches_deleted();
                    obs::emit_branch_deleted(&name);
                    report.branches_deleted.push(owned.branch);
                }
                Err(err) => {
                    report.record_error(&format!("branch {name}"), &err);
                    report.branches_leaked.push(owned.branch);
                }
            }
        }

        self.working_copy = None;
        for dir in std::mem::take(&mut self.workdirs) {
            let shown = dir.path().display().to_string();
            match dir.close() {
                Ok(()) => report.dirs_removed += 1,
                Err(err) => report.record_error(&format!("directory {shown}"), &err),
            }
        }

        report
    }
}

impl Drop for FixtureScope {
    fn drop(&mut self) {
        if !self.branches.is_empty() {
            let names: Vec<&str> = self.branches.iter().map(|b| b.branch.full()).collect();
            warn!(
                event = "cleanup.leak",
                branches = ?names,
                "fixture scope dropped without cleanup; remote branches remain"
            );
        }
    }
}

fn validate_relative(path: &Path) -> Result<()> {
    let escapes = path.as_os_str().is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(VsyncError::InvalidInput(format!(
            "sync file must be a relative path inside the repository: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_file_must_stay_inside_repo() {
        assert!(validate_relative(Path::new(".teamcity/settings.kts")).is_ok());
        assert!(validate_relative(Path::new("../outside.kts")).is_err());
        assert!(validate_relative(Path::new("/etc/passwd")).is_err());
        assert!(validate_relative(Path::new("")).is_err());
    }

    #[tokio::test]
    async fn test_content_source_file_missing() {
        let err = ContentSource::File(PathBuf::from("/definitely/not/here.kts"))
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, VsyncError::InvalidInput(_)));
        assert_eq!(
            ContentSource::text("x").load().await.unwrap(),
            b"x".to_vec()
        );
    }
}
