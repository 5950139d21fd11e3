//! Domain types shared by the waiter, fixtures and scenarios.

pub mod error;
pub mod fixture;
pub mod job;
pub mod phase;

pub use error::{PollErrorKind, Result, VsyncError};
pub use fixture::{BranchRef, ProjectFixture, TransientBranch};
pub use job::{JobHandle, JobOutcome, JobState};
pub use phase::SettingsPhase;
