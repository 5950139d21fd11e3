//! Error taxonomy for harness operations.

use vsync_rest::ApiError;

/// How a waiter treats an error raised while fetching a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollErrorKind {
    /// Log, keep polling.
    Transient,
    /// Stop polling; the awaited resource is gone.
    Terminal,
    /// Propagate immediately; polling again cannot help.
    Fatal,
}

/// Harness errors.
#[derive(Debug, thiserror::Error)]
pub enum VsyncError {
    #[error("server api error: {0}")]
    Api(#[from] ApiError),

    #[error("git error: {0}")]
    Git(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cancelled while {what}")]
    Cancelled { what: String },

    #[error("{what} did not converge ({outcome} after {attempts} polls, {elapsed_ms} ms); last seen: {last_seen}")]
    WaitFailed {
        what: String,
        outcome: &'static str,
        attempts: u32,
        elapsed_ms: u128,
        last_seen: String,
    },

    #[error("assertion failed: {what}: expected {expected}, got {actual}")]
    Assertion {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("build {build_id} of {build_type} failed: {detail}")]
    BuildFailed {
        build_id: u64,
        build_type: String,
        detail: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VsyncError {
    /// Classify this error for a polling loop.
    pub fn poll_kind(&self) -> PollErrorKind {
        match self {
            VsyncError::Api(e) if e.is_not_found() => PollErrorKind::Terminal,
            VsyncError::Api(e) if e.is_transient() => PollErrorKind::Transient,
            VsyncError::Io(_) => PollErrorKind::Transient,
            _ => PollErrorKind::Fatal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VsyncError::Cancelled { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VsyncError::Api(e) if e.is_not_found())
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, VsyncError>;
