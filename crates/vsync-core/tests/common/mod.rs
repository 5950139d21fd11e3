//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use vsync_core::HarnessConfig;

pub const BASE_PROJECT: &str = "Vsync";

/// Configuration pointing at a fake server and an https repository.
pub fn config() -> HarnessConfig {
    config_with(&[])
}

pub fn config_with(extra: &[(&str, &str)]) -> HarnessConfig {
    let mut env: HashMap<String, String> = [
        ("VSYNC_BASE_URL", "https://ci.example.com"),
        ("VSYNC_USERNAME", "admin"),
        ("VSYNC_PASSWORD", "hunter2"),
        ("VSYNC_PROJECT_ID", BASE_PROJECT),
        ("VSYNC_DSL_REPO_URL", "https://git.example.com/org/dsl.git"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    HarnessConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn ref_exists(bare: &Path, full_ref: &str) -> bool {
    StdCommand::new("git")
        .args(["rev-parse", "--verify", "--quiet", full_ref])
        .current_dir(bare)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A bare repository with one commit on `main` containing `settings.kts`.
/// Returns the owning temp dir and the bare repository path.
pub fn seeded_bare_repo() -> (tempfile::TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let bare = root.path().join("remote.git");
    let seed = root.path().join("seed");
    std::fs::create_dir(&bare).unwrap();
    std::fs::create_dir(&seed).unwrap();

    run_git(&bare, &["init", "--bare", "--quiet"]);
    run_git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    run_git(&seed, &["init", "--quiet"]);
    run_git(&seed, &["config", "user.name", "test-user"]);
    run_git(&seed, &["config", "user.email", "test@example.com"]);
    run_git(&seed, &["config", "commit.gpgsign", "false"]);
    run_git(&seed, &["checkout", "--quiet", "-b", "main"]);
    std::fs::create_dir_all(seed.join(".teamcity")).unwrap();
    std::fs::write(seed.join(".teamcity/settings.kts"), "version = \"2024.03\"\n").unwrap();
    run_git(&seed, &["add", "--all"]);
    run_git(&seed, &["commit", "--quiet", "-m", "initial settings"]);
    run_git(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]);
    run_git(&seed, &["push", "--quiet", "origin", "main"]);

    (root, bare)
}
