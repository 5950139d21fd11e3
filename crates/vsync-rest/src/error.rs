//! Error types for vsync-rest

use reqwest::Method;
use thiserror::Error;

/// Longest response body excerpt carried inside an error.
const BODY_EXCERPT_LIMIT: usize = 1024;

/// Errors produced by the remote resource client.
///
/// The client never retries; these variants carry enough information for the
/// caller (usually a waiter) to decide whether polling again can help.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, timeout, reset).
    #[error("transport error on {method} {path}: {message}")]
    Transport {
        method: Method,
        path: String,
        message: String,
    },

    /// The server answered with a status the operation does not accept.
    #[error("{method} {path} returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    /// The addressed resource does not exist.
    #[error("resource not found: {method} {path}")]
    NotFound { method: Method, path: String },

    /// The body could not be decoded into the expected shape.
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    /// A caller passed an identifier or URL that cannot form a valid request.
    #[error("invalid request input: {0}")]
    InvalidInput(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client construction failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    /// Whether the resource was reported missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Network failures, 5xx answers and undecodable bodies may clear up on
    /// their own; everything else reflects a request the server will keep
    /// rejecting.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } | ApiError::Decode { .. } => true,
            ApiError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub(crate) fn unexpected(method: Method, path: &str, status: u16, body: &str) -> Self {
        ApiError::UnexpectedStatus {
            method,
            path: path.to_string(),
            status,
            body: excerpt(body),
        }
    }
}

/// Trim a response body so errors stay readable in logs.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut cut = BODY_EXCERPT_LIMIT;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}
