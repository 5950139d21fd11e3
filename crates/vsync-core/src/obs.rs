//! Structured lifecycle events.
//!
//! Every event carries an `event` field (`wait.started`, `branch.created`,
//! ...) so log pipelines can filter without parsing messages. Callers pass
//! already-redacted text; nothing here sees credentials.

use std::time::Duration;

use tracing::{debug, info, warn};

/// Span that tags everything logged during one scenario with its name and
/// project id.
///
/// Async code attaches it with [`tracing::Instrument`]; synchronous code
/// can hold the guard returned by [`ScenarioSpan::enter`].
pub struct ScenarioSpan {
    span: tracing::Span,
}

impl ScenarioSpan {
    pub fn new(scenario: &str, project_id: &str) -> Self {
        Self {
            span: tracing::info_span!(
                "vsync.scenario",
                scenario = %scenario,
                project_id = %project_id
            ),
        }
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

pub fn emit_wait_started(what: &str, timeout: Duration, interval: Duration) {
    info!(
        event = "wait.started",
        what = %what,
        timeout_ms = timeout.as_millis() as u64,
        interval_ms = interval.as_millis() as u64,
    );
}

pub fn emit_wait_poll(what: &str, attempt: u32, observed: &str) {
    debug!(event = "wait.poll", what = %what, attempt = attempt, observed = %observed);
}

pub fn emit_wait_poll_error(what: &str, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(event = "wait.poll_error", what = %what, attempt = attempt, error = %error);
}

pub fn emit_wait_finished(what: &str, outcome: &str, attempts: u32, elapsed: Duration) {
    info!(
        event = "wait.finished",
        what = %what,
        outcome = outcome,
        attempts = attempts,
        elapsed_ms = elapsed.as_millis() as u64,
    );
}

pub fn emit_branch_created(branch: &str, source: &str) {
    info!(event = "branch.created", branch = %branch, source = %source);
}

pub fn emit_branch_deleted(branch: &str) {
    info!(event = "branch.deleted", branch = %branch);
}

/// Cleanup problems are logged and swallowed.
pub fn emit_cleanup_error(resource: &str, error: &dyn std::fmt::Display) {
    warn!(event = "cleanup.error", resource = %resource, error = %error);
}

pub fn emit_scenario_started(scenario: &str, project_id: &str) {
    info!(event = "scenario.started", scenario = %scenario, project_id = %project_id);
}

pub fn emit_scenario_finished(scenario: &str, duration_ms: u64, success: bool) {
    info!(
        event = "scenario.finished",
        scenario = %scenario,
        duration_ms = duration_ms,
        success = success,
    );
}
