//! Vsync-Rest: typed client for the build server's REST resources
//!
//! This crate is the only place that talks HTTP. It knows how to address
//! projects, VCS roots, versioned settings, builds and build parameters, and
//! how to turn server answers into typed values or classified errors.
//!
//! ## Key Components
//!
//! - `ServerApi`: async seam used by everything above this crate
//! - `RestClient`: reqwest-backed implementation (basic auth, JSON)
//! - `FakeServer`: scriptable in-memory implementation for tests
//! - `Endpoint`: resource paths with identifiers encoded as opaque segments
//! - `StatusSnapshot`: one observation of a project's versioned-settings status

pub mod api;
pub mod client;
pub mod dto;
pub mod endpoints;
mod error;
pub mod fakes;
mod snapshot;

pub use api::ServerApi;
pub use client::{RestClient, RestConfig};
pub use endpoints::Endpoint;
pub use error::ApiError;
pub use snapshot::StatusSnapshot;

pub use reqwest::{Method, Url};

/// Result type for remote resource operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
