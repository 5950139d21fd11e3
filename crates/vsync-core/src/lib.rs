//! Vsync Core: end-to-end harness for repository-driven build settings
//!
//! Drives a build server whose project settings live in a git repository
//! and checks that changes on either side converge.
//!
//! ## Key Components
//!
//! - `ConvergenceWaiter`: bounded, cancellable polling with typed outcomes
//! - `BuildAwaiter`: queue a build and wait for a success or failure verdict
//! - `FixtureScope`: temporary branches and working copies owned by one run
//! - `SettingsActions`: provisioning, settings loads and parameter waits
//! - `Scenario` / `run_scenario`: scenario bodies with guaranteed teardown

pub mod actions;
pub mod assertions;
pub mod build;
pub mod config;
pub mod domain;
pub mod fixtures;
pub mod git;
pub mod metrics;
pub mod naming;
pub mod obs;
pub mod scenario;
pub mod scenarios;
pub mod telemetry;
pub mod wait;

pub use actions::{dsl_vcs_root_id, SettingsActions};
pub use assertions::{expect_phase, ServerAssertions};
pub use build::BuildAwaiter;
pub use config::{HarnessConfig, Secret, VcsAuthMethod};
pub use domain::{
    BranchRef, JobHandle, JobOutcome, JobState, PollErrorKind, ProjectFixture, Result,
    SettingsPhase, TransientBranch, VsyncError,
};
pub use fixtures::{CleanupReport, ContentSource, FixtureScope};
pub use git::{GitCli, RemoteRepo, VcsTransport};
pub use metrics::METRICS;
pub use scenario::{run_scenario, Scenario, ScenarioContext, ScenarioReport};
pub use scenarios::{builtin_scenarios, catalog, find_scenario};
pub use telemetry::init_tracing;
pub use wait::{ConvergenceWaiter, Observation, WaitOutcome, WaitPolicy};

pub use tokio_util::sync::CancellationToken;
