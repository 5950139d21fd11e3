//! Git transport for the settings repository.
//!
//! [`VcsTransport`] is the seam fixtures talk to; [`GitCli`] implements it
//! by running the `git` binary. Credentials live only in the clone URL and
//! are scrubbed from every error message.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use vsync_rest::Url;

use crate::domain::{BranchRef, Result, VsyncError};

const REDACTED: &str = "***";

// ---------------------------------------------------------------------------
// RemoteRepo
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Location {
    Https(Url),
    Local(PathBuf),
}

/// The settings repository and how to authenticate against it.
///
/// Accepts `https://` URLs (credentials are embedded when cloning) and
/// local repositories given as `file://` URLs or absolute paths. Plain
/// `http://` and ssh remotes are rejected.
#[derive(Clone)]
pub struct RemoteRepo {
    location: Location,
    username: String,
    token: Option<String>,
}

impl RemoteRepo {
    pub fn new(url: &str, username: &str, token: Option<&str>) -> Result<Self> {
        let url = url.trim();
        let location = if url.starts_with("https://") {
            let parsed = Url::parse(url)
                .map_err(|e| VsyncError::Config(format!("invalid repository URL: {e}")))?;
            if !parsed.username().is_empty() || parsed.password().is_some() {
                return Err(VsyncError::Config(
                    "repository URL must not embed credentials".to_string(),
                ));
            }
            Location::Https(parsed)
        } else if let Some(path) = url.strip_prefix("file://") {
            Location::Local(PathBuf::from(path))
        } else if Path::new(url).is_absolute() {
            Location::Local(PathBuf::from(url))
        } else if url.starts_with("http://") {
            return Err(VsyncError::Config(
                "repository URL must use https, plain http would expose credentials".to_string(),
            ));
        } else {
            return Err(VsyncError::Config(format!(
                "unsupported repository URL '{url}': expected https:// or a local path"
            )));
        };

        let username = if username.trim().is_empty() {
            "git".to_string()
        } else {
            username.trim().to_string()
        };

        Ok(RemoteRepo {
            location,
            username,
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.location, Location::Local(_))
    }

    /// URL safe to print.
    pub fn display_url(&self) -> String {
        match &self.location {
            Location::Https(url) => url.to_string(),
            Location::Local(path) => path.display().to_string(),
        }
    }

    /// URL handed to `git clone`, with credentials for https remotes.
    fn clone_url(&self) -> Result<String> {
        match &self.location {
            Location::Local(path) => Ok(path.display().to_string()),
            Location::Https(url) => {
                let Some(token) = &self.token else {
                    return Ok(url.to_string());
                };
                let mut url = url.clone();
                url.set_username(&self.username)
                    .and_then(|_| url.set_password(Some(token)))
                    .map_err(|_| {
                        VsyncError::Config("repository URL cannot carry credentials".to_string())
                    })?;
                Ok(url.to_string())
            }
        }
    }

    /// Strings that must never reach a log line.
    fn secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if let Some(token) = &self.token {
            if let Ok(url) = self.clone_url() {
                if let Ok(parsed) = Url::parse(&url) {
                    if let Some(encoded) = parsed.password() {
                        secrets.push(encoded.to_string());
                    }
                }
            }
            secrets.push(token.clone());
        }
        secrets
    }
}

impl std::fmt::Debug for RemoteRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepo")
            .field("url", &self.display_url())
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Replace every secret occurring in `text`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        out = out.replace(secret.as_str(), REDACTED);
    }
    out
}

// ---------------------------------------------------------------------------
// VcsTransport
// ---------------------------------------------------------------------------

/// Repository operations needed by fixtures. Every method acts on a working
/// copy whose `origin` is the settings repository.
#[async_trait]
pub trait VcsTransport: Send + Sync {
    /// Clone `remote` into the existing empty directory `dest`.
    async fn clone_repo(&self, remote: &RemoteRepo, dest: &Path) -> Result<()>;

    /// Refresh `origin/<branch>`; fails if the remote branch does not exist.
    async fn fetch_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()>;

    /// Point local `branch` at `start_point` and check it out, discarding
    /// local changes.
    async fn checkout_branch(&self, workdir: &Path, branch: &BranchRef, start_point: &str)
        -> Result<()>;

    /// Stage everything and commit; returns the new commit id.
    async fn commit_all(&self, workdir: &Path, message: &str) -> Result<String>;

    async fn push_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()>;

    async fn delete_remote_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()>;

    async fn rev_parse(&self, workdir: &Path, rev: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`VcsTransport`] backed by the `git` executable.
pub struct GitCli {
    timeout: Duration,
    author_name: String,
    author_email: String,
    secrets: Mutex<Vec<String>>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        GitCli {
            timeout: DEFAULT_GIT_TIMEOUT,
            author_name: "vsync".to_string(),
            author_email: "vsync@localhost".to_string(),
            secrets: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn scrub(&self, text: &str) -> String {
        match self.secrets.lock() {
            Ok(secrets) => redact(text, &secrets),
            Err(_) => REDACTED.to_string(),
        }
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let shown = self.scrub(&args.join(" "));
        debug!(git = %shown, dir = %dir.display(), "running git");

        let child = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VsyncError::Git(format!("failed to run git: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VsyncError::Git(format!("git {shown} timed out after {:?}", self.timeout))
            })?
            .map_err(|e| VsyncError::Git(format!("git {shown} failed to complete: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VsyncError::Git(format!(
                "git {shown} failed: {}",
                self.scrub(stderr.trim())
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VcsTransport for GitCli {
    async fn clone_repo(&self, remote: &RemoteRepo, dest: &Path) -> Result<()> {
        if let Ok(mut secrets) = self.secrets.lock() {
            for secret in remote.secrets() {
                if !secrets.contains(&secret) {
                    secrets.push(secret);
                }
            }
        }
        let url = remote.clone_url()?;
        self.run(dest, &["clone", "--quiet", "--no-tags", "--", &url, "."])
            .await?;
        Ok(())
    }

    async fn fetch_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()> {
        let refspec = format!("+{}:refs/remotes/origin/{}", branch.full(), branch.short());
        self.run(workdir, &["fetch", "--quiet", "--no-tags", "origin", &refspec])
            .await?;
        Ok(())
    }

    async fn checkout_branch(
        &self,
        workdir: &Path,
        branch: &BranchRef,
        start_point: &str,
    ) -> Result<()> {
        self.run(
            workdir,
            &["checkout", "--quiet", "--force", "-B", branch.short(), start_point],
        )
        .await?;
        Ok(())
    }

    async fn commit_all(&self, workdir: &Path, message: &str) -> Result<String> {
        self.run(workdir, &["add", "--all"]).await?;
        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.run(
            workdir,
            &[
                "-c",
                &name,
                "-c",
                &email,
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "-m",
                message,
            ],
        )
        .await?;
        self.rev_parse(workdir, "HEAD").await
    }

    async fn push_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()> {
        let refspec = format!("{0}:{0}", branch.full());
        self.run(workdir, &["push", "--quiet", "origin", &refspec])
            .await?;
        Ok(())
    }

    async fn delete_remote_branch(&self, workdir: &Path, branch: &BranchRef) -> Result<()> {
        self.run(workdir, &["push", "--quiet", "origin", "--delete", branch.full()])
            .await?;
        Ok(())
    }

    async fn rev_parse(&self, workdir: &Path, rev: &str) -> Result<String> {
        let sha = self
            .run(workdir, &["rev-parse", "--verify", "--quiet", rev])
            .await?;
        if sha.is_empty() {
            return Err(VsyncError::Git(format!(
                "git rev-parse {rev} returned empty output"
            )));
        }
        Ok(sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_remote_embeds_credentials_only_in_clone_url() {
        let remote =
            RemoteRepo::new("https://git.example.com/org/dsl.git", "", Some("s3cr3t/tok")).unwrap();
        assert!(!remote.is_local());
        assert_eq!(remote.display_url(), "https://git.example.com/org/dsl.git");

        let clone = remote.clone_url().unwrap();
        assert!(clone.starts_with("https://git:"));
        assert!(clone.contains("@git.example.com"));

        let debug = format!("{remote:?}");
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn test_redaction_covers_raw_and_encoded_token() {
        let remote =
            RemoteRepo::new("https://git.example.com/dsl.git", "bot", Some("a/b c")).unwrap();
        let clone = remote.clone_url().unwrap();
        let message = format!("fatal: unable to access '{clone}': token a/b c rejected");
        let scrubbed = redact(&message, &remote.secrets());
        assert!(!scrubbed.contains("a/b c"));
        assert!(!scrubbed.contains("a%2Fb%20c"));
        assert!(scrubbed.contains(REDACTED));
    }

    #[test]
    fn test_rejects_insecure_and_ssh_remotes() {
        assert!(RemoteRepo::new("http://git.example.com/dsl.git", "git", Some("t")).is_err());
        assert!(RemoteRepo::new("git@github.com:org/dsl.git", "git", None).is_err());
        assert!(RemoteRepo::new("relative/path", "git", None).is_err());
        assert!(
            RemoteRepo::new("https://user:pw@git.example.com/dsl.git", "git", None).is_err()
        );
    }

    #[test]
    fn test_local_remotes() {
        let remote = RemoteRepo::new("/srv/git/dsl.git", "git", None).unwrap();
        assert!(remote.is_local());
        assert_eq!(remote.clone_url().unwrap(), "/srv/git/dsl.git");

        let remote = RemoteRepo::new("file:///srv/git/dsl.git", "git", None).unwrap();
        assert_eq!(remote.display_url(), "/srv/git/dsl.git");
        assert!(remote.secrets().is_empty());
    }
}
