//! Process-wide counters for harness activity.
//!
//! Call sites bump counters without locking. The CLI calls
//! [`Metrics::flush`] once at exit so a run ends with a single summary line.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub polls: u64,
    pub waits_converged: u64,
    pub waits_timed_out: u64,
    pub waits_aborted: u64,
    pub branches_created: u64,
    pub branches_deleted: u64,
    pub cleanup_errors: u64,
}

pub struct Metrics {
    polls: AtomicU64,
    waits_converged: AtomicU64,
    waits_timed_out: AtomicU64,
    waits_aborted: AtomicU64,
    branches_created: AtomicU64,
    branches_deleted: AtomicU64,
    cleanup_errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            waits_converged: AtomicU64::new(0),
            waits_timed_out: AtomicU64::new(0),
            waits_aborted: AtomicU64::new(0),
            branches_created: AtomicU64::new(0),
            branches_deleted: AtomicU64::new(0),
            cleanup_errors: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_polls(&self) {
        Self::bump(&self.polls, "polls");
    }

    pub fn inc_waits_converged(&self) {
        Self::bump(&self.waits_converged, "waits_converged");
    }

    pub fn inc_waits_timed_out(&self) {
        Self::bump(&self.waits_timed_out, "waits_timed_out");
    }

    pub fn inc_waits_aborted(&self) {
        Self::bump(&self.waits_aborted, "waits_aborted");
    }

    pub fn inc_branches_created(&self) {
        Self::bump(&self.branches_created, "branches_created");
    }

    pub fn inc_branches_deleted(&self) {
        Self::bump(&self.branches_deleted, "branches_deleted");
    }

    pub fn inc_cleanup_errors(&self) {
        Self::bump(&self.cleanup_errors, "cleanup_errors");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            waits_converged: self.waits_converged.load(Ordering::Relaxed),
            waits_timed_out: self.waits_timed_out.load(Ordering::Relaxed),
            waits_aborted: self.waits_aborted.load(Ordering::Relaxed),
            branches_created: self.branches_created.load(Ordering::Relaxed),
            branches_deleted: self.branches_deleted.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
        }
    }

    /// Emit all counters as one `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            polls = s.polls,
            waits_converged = s.waits_converged,
            waits_timed_out = s.waits_timed_out,
            waits_aborted = s.waits_aborted,
            branches_created = s.branches_created,
            branches_deleted = s.branches_deleted,
            cleanup_errors = s.cleanup_errors,
        );
    }

    /// Zero every counter (tests).
    pub fn reset(&self) {
        for counter in [
            &self.polls,
            &self.waits_converged,
            &self.waits_timed_out,
            &self.waits_aborted,
            &self.branches_created,
            &self.branches_deleted,
            &self.cleanup_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
