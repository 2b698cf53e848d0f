//! Error taxonomy for the Ark generation API.
//!
//! Every remote or transport failure is classified into an [`ApiError`]
//! carrying one of the closed [`ApiErrorCode`] values. Failures that never
//! reach the service (bad caller input, polling timeout) are separate
//! [`GenerationError`] variants so callers can tell them apart.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used for every connectivity failure.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error: Failed to connect to the API. Please check your internet connection.";

// === Types ===

/// Closed set of error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    Unauthorized,
    InvalidRequest,
    RateLimitExceeded,
    ServerError,
    NetworkError,
    Unknown,
}

impl ApiErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a code that names a taxonomy member verbatim.
    #[must_use]
    pub fn from_taxonomy(code: &str) -> Option<Self> {
        match code {
            "UNAUTHORIZED" => Some(Self::Unauthorized),
            "INVALID_REQUEST" => Some(Self::InvalidRequest),
            "RATE_LIMIT_EXCEEDED" => Some(Self::RateLimitExceeded),
            "SERVER_ERROR" => Some(Self::ServerError),
            "NETWORK_ERROR" => Some(Self::NetworkError),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Derive a code from an HTTP status when the body names none.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Unauthorized,
            400 | 404 | 409 | 422 => Self::InvalidRequest,
            429 => Self::RateLimitExceeded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure reported by (or on the way to) the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// The service's own error code, when it used one outside the taxonomy.
    #[serde(rename = "remoteCode", skip_serializing_if = "Option::is_none")]
    pub remote_code: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: None,
            remote_code: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Error envelope returned by the service: `{"error": {"code", "message"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<RemoteError>,
}

/// Failures surfaced by the generation orchestrator.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Caller input rejected locally, before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The polling loop ran out of attempts before a terminal status.
    #[error("Task {task_id} did not complete within {} seconds ({attempts} attempts)", waited.as_secs_f64())]
    PollTimeout {
        task_id: String,
        attempts: u32,
        waited: Duration,
    },
}

impl GenerationError {
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Taxonomy code when the failure came from the API layer.
    #[cfg(test)]
    pub fn api_code(&self) -> Option<ApiErrorCode> {
        match self {
            Self::Api(err) => Some(err.code),
            _ => None,
        }
    }
}

// === Classification ===

/// Classify a non-2xx response from its status and raw body.
#[must_use]
pub fn classify_response(status: StatusCode, body: &str) -> ApiError {
    let fallback_message = format!(
        "API error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string();

    let remote = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);

    let Some(remote) = remote else {
        return ApiError::new(ApiErrorCode::from_status(status), fallback_message)
            .with_status(status.as_u16());
    };

    classify_remote(&remote, Some(status), fallback_message)
}

/// Classify an error payload the service embedded in an otherwise successful body.
#[must_use]
pub fn classify_embedded(remote: &RemoteError) -> ApiError {
    classify_remote(remote, None, "API error: remote service reported a failure".to_string())
}

fn classify_remote(
    remote: &RemoteError,
    status: Option<StatusCode>,
    fallback_message: String,
) -> ApiError {
    let message = remote
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(fallback_message);

    let taxonomy = remote.code.as_deref().and_then(ApiErrorCode::from_taxonomy);
    let code = taxonomy.unwrap_or_else(|| {
        status.map_or(ApiErrorCode::Unknown, ApiErrorCode::from_status)
    });
    let remote_code = if taxonomy.is_some() {
        None
    } else {
        remote.code.clone()
    };

    ApiError {
        code,
        message,
        status_code: status.map(|s| s.as_u16()),
        remote_code,
    }
}

/// Classify a failure where no response was received (or its body was unreadable).
#[must_use]
pub fn classify_transport(err: &reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        return ApiError::new(ApiErrorCode::NetworkError, NETWORK_ERROR_MESSAGE);
    }
    let mut api_error = ApiError::new(ApiErrorCode::Unknown, format!("Unexpected error: {err}"));
    if let Some(status) = err.status() {
        api_error.status_code = Some(status.as_u16());
    }
    api_error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_taxonomy_code_is_used_verbatim() {
        let body = r#"{"error":{"code":"UNAUTHORIZED","message":"bad key"}}"#;
        let err = classify_response(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.code, ApiErrorCode::Unauthorized);
        assert_eq!(err.message, "bad key");
        assert_eq!(err.status_code, Some(401));
        assert!(err.remote_code.is_none());
    }

    #[test]
    fn remote_specific_code_falls_back_to_status_class() {
        let body = r#"{"error":{"code":"InvalidParameter","message":"size is invalid"}}"#;
        let err = classify_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code, ApiErrorCode::InvalidRequest);
        assert_eq!(err.message, "size is invalid");
        assert_eq!(err.remote_code.as_deref(), Some("InvalidParameter"));
    }

    #[test]
    fn non_json_body_synthesizes_message_from_status_line() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.code, ApiErrorCode::ServerError);
        assert_eq!(err.message, "API error: 502 Bad Gateway");
    }

    #[test]
    fn rate_limit_status_maps_to_rate_limit_code() {
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert_eq!(err.code, ApiErrorCode::RateLimitExceeded);
        assert_eq!(err.message, "API error: 429 Too Many Requests");
    }

    #[test]
    fn envelope_without_message_keeps_status_message() {
        let body = r#"{"error":{"code":"SERVER_ERROR"}}"#;
        let err = classify_response(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err.code, ApiErrorCode::ServerError);
        assert_eq!(err.message, "API error: 500 Internal Server Error");
    }

    #[test]
    fn embedded_error_without_status_is_unknown_unless_named() {
        let err = classify_embedded(&RemoteError {
            code: Some("OutputImageSensitiveContentDetected".to_string()),
            message: Some("blocked".to_string()),
        });
        assert_eq!(err.code, ApiErrorCode::Unknown);
        assert_eq!(err.message, "blocked");
        assert!(err.status_code.is_none());
    }

    #[test]
    fn api_error_serializes_with_camel_case_status() {
        let err = ApiError::new(ApiErrorCode::RateLimitExceeded, "slow down").with_status(429);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(value["statusCode"], 429);
        assert!(value.get("remoteCode").is_none());
    }

    #[test]
    fn poll_timeout_message_names_waited_seconds() {
        let err = GenerationError::PollTimeout {
            task_id: "cgt-1".to_string(),
            attempts: 60,
            waited: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "Task cgt-1 did not complete within 300 seconds (60 attempts)"
        );
        assert!(err.api_code().is_none());
    }

    #[test]
    fn poll_timeout_reports_fractional_seconds() {
        let short = GenerationError::PollTimeout {
            task_id: "cgt-1".to_string(),
            attempts: 3,
            waited: Duration::from_millis(750),
        };
        assert_eq!(
            short.to_string(),
            "Task cgt-1 did not complete within 0.75 seconds (3 attempts)"
        );

        let default_budget = GenerationError::PollTimeout {
            task_id: "cgt-2".to_string(),
            attempts: 60,
            waited: Duration::from_secs(300),
        };
        assert_eq!(
            default_budget.to_string(),
            "Task cgt-2 did not complete within 300 seconds (60 attempts)"
        );
    }
}
