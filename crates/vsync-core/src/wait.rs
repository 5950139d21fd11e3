//! Deadline-bounded polling until a remote resource converges.
//!
//! [`ConvergenceWaiter::wait_until`] repeatedly fetches a snapshot and
//! stops on the first of:
//!
//! - the snapshot is terminal (`Aborted`)
//! - the snapshot is the target (`Converged`)
//! - the deadline passed (`TimedOut`)
//! - the cancellation token fired (`Err(Cancelled)`)
//!
//! Fetch errors are classified with [`VsyncError::poll_kind`]: transient
//! ones are logged and polling continues, a missing resource aborts the
//! wait, anything else is returned as is.
//!
//! Sleeps are clamped to the remaining time, so a timed-out wait returns
//! within `[timeout, timeout + interval)`. Time is read from
//! `tokio::time::Instant`, so tests can run against a paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vsync_rest::dto::ParametersDto;
use vsync_rest::StatusSnapshot;

use crate::domain::{JobState, PollErrorKind, Result, VsyncError};
use crate::metrics::METRICS;
use crate::obs;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How long to wait and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    /// Versioned-settings status after enabling or loading settings.
    pub const SETTINGS: WaitPolicy =
        WaitPolicy::new(Duration::from_secs(120), Duration::from_secs(2));
    /// Build parameter counts after a repository change.
    pub const PARAMETERS: WaitPolicy =
        WaitPolicy::new(Duration::from_secs(120), Duration::from_secs(1));
    /// Fast-moving state where sub-second reaction matters.
    pub const SHORT: WaitPolicy =
        WaitPolicy::new(Duration::from_secs(120), Duration::from_millis(250));
    /// Build jobs, which take minutes.
    pub const BUILD: WaitPolicy = WaitPolicy::new(Duration::from_secs(600), Duration::from_secs(5));

    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        WaitPolicy { timeout, interval }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(VsyncError::InvalidInput(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(VsyncError::InvalidInput(
                "wait timeout must be greater than zero".to_string(),
            ));
        }
        if self.interval > self.timeout {
            return Err(VsyncError::InvalidInput(format!(
                "poll interval {:?} exceeds timeout {:?}",
                self.interval, self.timeout
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A snapshot that can be rendered into diagnostics.
pub trait Observation {
    fn describe(&self) -> String;
}

impl Observation for StatusSnapshot {
    fn describe(&self) -> String {
        self.summary()
    }
}

impl Observation for JobState {
    fn describe(&self) -> String {
        self.to_string()
    }
}

impl Observation for ParametersDto {
    fn describe(&self) -> String {
        format!("{} parameters", self.effective_count())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<S> {
    Converged {
        snapshot: S,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        last: Option<S>,
        attempts: u32,
        elapsed: Duration,
    },
    Aborted {
        reason: String,
        last: Option<S>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<S> WaitOutcome<S> {
    pub fn is_converged(&self) -> bool {
        matches!(self, WaitOutcome::Converged { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, WaitOutcome::Aborted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            WaitOutcome::Converged { .. } => "converged",
            WaitOutcome::TimedOut { .. } => "timed_out",
            WaitOutcome::Aborted { .. } => "aborted",
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Converged { attempts, .. }
            | WaitOutcome::TimedOut { attempts, .. }
            | WaitOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Converged { elapsed, .. }
            | WaitOutcome::TimedOut { elapsed, .. }
            | WaitOutcome::Aborted { elapsed, .. } => *elapsed,
        }
    }

    /// The converged snapshot, or the last one seen before giving up.
    pub fn last_snapshot(&self) -> Option<&S> {
        match self {
            WaitOutcome::Converged { snapshot, .. } => Some(snapshot),
            WaitOutcome::TimedOut { last, .. } | WaitOutcome::Aborted { last, .. } => {
                last.as_ref()
            }
        }
    }
}

impl<S: Observation> WaitOutcome<S> {
    /// Last observation as text, for failure messages.
    pub fn last_seen(&self) -> String {
        let seen = self
            .last_snapshot()
            .map(Observation::describe)
            .unwrap_or_else(|| "<no successful poll>".to_string());
        match self {
            WaitOutcome::Aborted { reason, .. } => format!("{seen} (aborted: {reason})"),
            _ => seen,
        }
    }

    /// The converged snapshot, or `WaitFailed` naming `what` and the last
    /// observation.
    pub fn into_converged(self, what: &str) -> Result<S> {
        let failure = VsyncError::WaitFailed {
            what: what.to_string(),
            outcome: self.label(),
            attempts: self.attempts(),
            elapsed_ms: self.elapsed().as_millis(),
            last_seen: self.last_seen(),
        };
        match self {
            WaitOutcome::Converged { snapshot, .. } => Ok(snapshot),
            _ => Err(failure),
        }
    }
}

// ---------------------------------------------------------------------------
// Waiter
// ---------------------------------------------------------------------------

/// Polls a fetch function until a predicate holds, bounded by a deadline
/// and a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceWaiter {
    cancel: CancellationToken,
}

impl ConvergenceWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        ConvergenceWaiter { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Poll `fetch` until `is_target` or `is_terminal` holds for a snapshot,
    /// or `policy.timeout` elapses. `is_terminal` is checked first.
    pub async fn wait_until<S, F, Fut, T, A>(
        &self,
        what: &str,
        policy: WaitPolicy,
        mut fetch: F,
        is_target: T,
        is_terminal: A,
    ) -> Result<WaitOutcome<S>>
    where
        S: Observation,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S>>,
        T: Fn(&S) -> bool,
        A: Fn(&S) -> bool,
    {
        policy.validate()?;
        let cancelled = || VsyncError::Cancelled {
            what: format!("waiting for {what}"),
        };
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        obs::emit_wait_started(what, policy.timeout, policy.interval);
        let started = Instant::now();
        let deadline = started + policy.timeout;
        let mut attempts = 0u32;
        let mut last: Option<S> = None;

        loop {
            attempts += 1;
            METRICS.inc_polls();

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled()),
                polled = tokio::time::timeout_at(deadline, fetch()) => polled,
            };

            match polled {
                Ok(Ok(snapshot)) => {
                    let observed = snapshot.describe();
                    obs::emit_wait_poll(what, attempts, &observed);
                    if is_terminal(&snapshot) {
                        return Ok(finish(
                            what,
                            WaitOutcome::Aborted {
                                reason: format!("terminal state observed: {observed}"),
                                last: Some(snapshot),
                                attempts,
                                elapsed: started.elapsed(),
                            },
                        ));
                    }
                    if is_target(&snapshot) {
                        return Ok(finish(
                            what,
                            WaitOutcome::Converged {
                                snapshot,
                                attempts,
                                elapsed: started.elapsed(),
                            },
                        ));
                    }
                    last = Some(snapshot);
                }
                Ok(Err(err)) => match err.poll_kind() {
                    PollErrorKind::Transient => obs::emit_wait_poll_error(what, attempts, &err),
                    PollErrorKind::Terminal => {
                        return Ok(finish(
                            what,
                            WaitOutcome::Aborted {
                                reason: err.to_string(),
                                last,
                                attempts,
                                elapsed: started.elapsed(),
                            },
                        ));
                    }
                    PollErrorKind::Fatal => return Err(err),
                },
                Err(_) => obs::emit_wait_poll_error(what, attempts, &"poll overran the deadline"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(finish(
                    what,
                    WaitOutcome::TimedOut {
                        last,
                        attempts,
                        elapsed: now - started,
                    },
                ));
            }

            let pause = policy.interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(pause) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(finish(
                    what,
                    WaitOutcome::TimedOut {
                        last,
                        attempts,
                        elapsed: now - started,
                    },
                ));
            }
        }
    }
}

fn finish<S>(what: &str, outcome: WaitOutcome<S>) -> WaitOutcome<S> {
    match &outcome {
        WaitOutcome::Converged { .. } => METRICS.inc_waits_converged(),
        WaitOutcome::TimedOut { .. } => METRICS.inc_waits_timed_out(),
        WaitOutcome::Aborted { .. } => METRICS.inc_waits_aborted(),
    }
    obs::emit_wait_finished(what, outcome.label(), outcome.attempts(), outcome.elapsed());
    outcome
}
