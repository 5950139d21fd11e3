//! Vsync - end-to-end checks for repository-driven build settings
//!
//! The `vsync` command provisions throwaway projects on a build server,
//! points them at a settings repository and verifies that both sides
//! converge.
//!
//! ## Commands
//!
//! - `run`: Run built-in scenarios (always tearing down what they created)
//! - `list-scenarios`: Show the built-in scenarios
//! - `status`: Print the versioned-settings status of a project
//! - `cleanup`: Delete leftover projects by id prefix
//! - `queue-build`: Queue a build and wait for it to succeed

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use vsync_core::{
    builtin_scenarios, catalog, find_scenario, run_scenario, BuildAwaiter, CancellationToken,
    ConvergenceWaiter, GitCli, HarnessConfig, Scenario, ScenarioContext, ScenarioReport,
    SettingsActions, VcsTransport, WaitPolicy, METRICS,
};
use vsync_rest::{RestClient, ServerApi};

#[derive(Parser)]
#[command(name = "vsync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "End-to-end checks for repository-driven build settings", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Read environment variables from this file before loading configuration
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios by name
    Run {
        /// Scenario names (see `list-scenarios`)
        #[arg(required_unless_present = "all")]
        scenarios: Vec<String>,

        /// Run every built-in scenario
        #[arg(long, conflicts_with = "scenarios")]
        all: bool,
    },

    /// List the built-in scenarios
    ListScenarios,

    /// Show the versioned-settings status of a project
    Status {
        /// Project id
        #[arg(long)]
        project: String,
    },

    /// Delete every project whose id starts with a prefix
    Cleanup {
        /// Project id prefix, e.g. the configured base id plus `_`
        #[arg(long)]
        prefix: String,
    },

    /// Queue a build and wait until it finishes successfully
    QueueBuild {
        /// Build type id
        #[arg(long)]
        build_type: String,

        /// Give up after this many seconds
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env_file(cli.env_file.as_deref())?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vsync_core::init_tracing(cli.json, level);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = match cli.command {
        Commands::ListScenarios => {
            cmd_list_scenarios();
            Ok(())
        }
        Commands::Run { scenarios, all } => {
            let (config, api) = connect()?;
            cmd_run(config, api, Arc::new(GitCli::new()), &scenarios, all, cancel).await
        }
        Commands::Status { project } => {
            let (_, api) = connect()?;
            cmd_status(api.as_ref(), &project).await
        }
        Commands::Cleanup { prefix } => {
            let (config, api) = connect()?;
            cmd_cleanup(config, api, &prefix).await
        }
        Commands::QueueBuild {
            build_type,
            timeout_secs,
        } => {
            let (_, api) = connect()?;
            cmd_queue_build(api, &build_type, timeout_secs, cancel).await
        }
    };

    METRICS.flush();
    result
}

fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            // A missing ./.env is fine.
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

/// Load configuration once and build the REST client from it.
fn connect() -> Result<(Arc<HarnessConfig>, Arc<dyn ServerApi>)> {
    let config = HarnessConfig::from_env().context("Failed to load harness configuration")?;
    let client: Arc<dyn ServerApi> = Arc::new(
        RestClient::new(&config.rest_config()).context("Failed to build the REST client")?,
    );
    Ok((Arc::new(config), client))
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(event = "cli.interrupted", "interrupt received; cancelling and tearing down");
            cancel.cancel();
        }
    });
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_list_scenarios() {
    for scenario in catalog() {
        println!("{:<20} {}", scenario.name(), scenario.description());
    }
}

fn select_scenarios(
    config: &HarnessConfig,
    names: &[String],
    all: bool,
) -> Result<Vec<Box<dyn Scenario>>> {
    if all {
        return Ok(builtin_scenarios(config));
    }
    names
        .iter()
        .map(|name| {
            find_scenario(name, config).with_context(|| {
                format!("Unknown scenario '{name}' (see `vsync list-scenarios`)")
            })
        })
        .collect()
}

/// Run the selected scenarios one after another. A cancelled run skips
/// the scenarios that have not started yet.
async fn run_selected(
    config: Arc<HarnessConfig>,
    api: Arc<dyn ServerApi>,
    transport: Arc<dyn VcsTransport>,
    names: &[String],
    all: bool,
    cancel: CancellationToken,
) -> Result<Vec<ScenarioReport>> {
    let selected = select_scenarios(&config, names, all)?;
    let mut reports = Vec::with_capacity(selected.len());

    for scenario in selected {
        if cancel.is_cancelled() {
            warn!(event = "scenario.skipped", scenario = scenario.name(), "run cancelled");
            continue;
        }
        let ctx = ScenarioContext::new(
            config.clone(),
            api.clone(),
            transport.clone(),
            cancel.clone(),
        )
        .with_context(|| format!("Failed to prepare scenario {}", scenario.name()))?;
        let report = run_scenario(scenario.as_ref(), ctx).await;
        print_report(&report);
        reports.push(report);
    }
    Ok(reports)
}

async fn cmd_run(
    config: Arc<HarnessConfig>,
    api: Arc<dyn ServerApi>,
    transport: Arc<dyn VcsTransport>,
    names: &[String],
    all: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let reports = run_selected(config, api, transport, names, all, cancel.clone()).await?;
    let failed = reports.iter().filter(|r| !r.passed()).count();
    info!(
        event = "run.finished",
        scenarios = reports.len(),
        failed = failed
    );

    if failed > 0 {
        bail!("{failed} of {} scenarios failed", reports.len());
    }
    if cancel.is_cancelled() {
        bail!("Run cancelled");
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    println!(
        "{verdict} {} ({} ms, project {})",
        report.name,
        report.duration.as_millis(),
        report.project_id
    );
    if let Err(err) = &report.result {
        println!("    error: {err}");
    }
    for error in &report.cleanup.errors {
        println!("    cleanup: {error}");
    }
    for branch in &report.cleanup.branches_leaked {
        println!("    leaked branch: {branch}");
    }
}

async fn cmd_status(api: &dyn ServerApi, project_id: &str) -> Result<()> {
    let snapshot = api
        .versioned_settings_status(project_id)
        .await
        .with_context(|| format!("Failed to fetch settings status of {project_id}"))?;
    println!("{project_id}: {}", snapshot.summary());
    if snapshot.is_not_found() {
        bail!("Project {project_id} not found");
    }
    Ok(())
}

async fn cmd_cleanup(
    config: Arc<HarnessConfig>,
    api: Arc<dyn ServerApi>,
    prefix: &str,
) -> Result<()> {
    let actions = SettingsActions::new(api, ConvergenceWaiter::new(), config);
    let deleted = actions
        .ensure_projects_with_prefix_absent(prefix)
        .await
        .with_context(|| format!("Failed to delete projects with prefix '{prefix}'"))?;

    if deleted.is_empty() {
        println!("No projects matching '{prefix}'");
    }
    for id in &deleted {
        println!("Deleted project {id}");
    }
    Ok(())
}

async fn cmd_queue_build(
    api: Arc<dyn ServerApi>,
    build_type: &str,
    timeout_secs: u64,
    cancel: CancellationToken,
) -> Result<()> {
    let policy = WaitPolicy::BUILD.with_timeout(Duration::from_secs(timeout_secs));
    let builds = BuildAwaiter::new(api, ConvergenceWaiter::with_cancellation(cancel));
    let job = builds
        .queue_and_await_success(build_type, policy)
        .await
        .with_context(|| format!("Build of {build_type} did not succeed"))?;
    println!("Build {} of {} succeeded", job.id, job.build_type);
    Ok(())
}
