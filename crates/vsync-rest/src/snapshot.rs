//! Point-in-time observation of a project's versioned-settings status.

use crate::dto::VersionedSettingsStatusDto;
use crate::error::{excerpt, ApiError};
use crate::ApiResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One poll of the versioned-settings status resource.
///
/// A missing project is a valid observation (`raw_code == 404`), not an
/// error: waiters treat it as the terminal signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub observed_at: DateTime<Utc>,
    pub raw_code: u16,
    pub message: Option<String>,
    pub error_text: Option<String>,
}

impl StatusSnapshot {
    /// Interpret a status response. Only 200 and 404 are observations;
    /// any other code is reported as an error by the caller.
    pub fn from_response(path: &str, raw_code: u16, body: &str) -> ApiResult<Self> {
        let observed_at = Utc::now();
        match raw_code {
            200 => {
                let dto: VersionedSettingsStatusDto =
                    serde_json::from_str(body).map_err(|e| ApiError::Decode {
                        path: path.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(StatusSnapshot {
                    observed_at,
                    raw_code,
                    message: dto.message,
                    error_text: dto.errors,
                })
            }
            404 => Ok(Self::missing(body)),
            other => Err(ApiError::UnexpectedStatus {
                method: reqwest::Method::GET,
                path: path.to_string(),
                status: other,
                body: excerpt(body),
            }),
        }
    }

    pub fn with_message(message: &str) -> Self {
        StatusSnapshot {
            observed_at: Utc::now(),
            raw_code: 200,
            message: Some(message.to_string()),
            error_text: None,
        }
    }

    /// Observation of a project that no longer exists.
    pub fn missing(body: &str) -> Self {
        let body = excerpt(body);
        StatusSnapshot {
            observed_at: Utc::now(),
            raw_code: 404,
            message: None,
            error_text: (!body.is_empty()).then_some(body),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.raw_code == 404
    }

    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Compact rendering for logs and failure diagnostics.
    pub fn summary(&self) -> String {
        match (&self.message, &self.error_text) {
            (Some(m), Some(e)) => format!("[{}] {m} (errors: {e})", self.raw_code),
            (Some(m), None) => format!("[{}] {m}", self.raw_code),
            (None, Some(e)) => format!("[{}] {e}", self.raw_code),
            (None, None) => format!("[{}] <no message>", self.raw_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let snap = StatusSnapshot::from_response(
            "/status",
            200,
            r#"{"message":"Changes from VCS are applied to project settings"}"#,
        )
        .unwrap();
        assert_eq!(snap.raw_code, 200);
        assert!(!snap.is_not_found());
        assert!(snap.message_text().contains("applied"));
    }

    #[test]
    fn test_missing_project_is_observation() {
        let snap = StatusSnapshot::from_response("/status", 404, "No project found").unwrap();
        assert!(snap.is_not_found());
        assert_eq!(snap.error_text.as_deref(), Some("No project found"));
        assert!(snap.summary().starts_with("[404]"));
    }

    #[test]
    fn test_other_codes_are_errors() {
        let err = StatusSnapshot::from_response("/status", 503, "busy").unwrap_err();
        assert!(err.is_transient());
        let err = StatusSnapshot::from_response("/status", 401, "").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_garbled_body_is_decode_error() {
        let err = StatusSnapshot::from_response("/status", 200, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
