//! Application error types and HTTP-to-OpenAI error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure subkinds reported by the upstream transcription provider.
///
/// The dispatcher maps each subkind to a distinct HTTP status so clients can
/// tell a retryable rate limit apart from a rejected payload.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UpstreamKind {
    /// Provider returned HTTP 429.
    RateLimited,
    /// Provider rejected the request itself (unsupported codec, bad key, ...).
    InvalidRequest,
    /// Network failure, timeout, or provider-side 5xx.
    Transport,
}

impl UpstreamKind {
    fn status(self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Transport => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limit_error",
            Self::InvalidRequest => "invalid_request_error",
            Self::Transport => "api_error",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limit_exceeded",
            Self::InvalidRequest => "upstream_rejected_request",
            Self::Transport => "upstream_unavailable",
        }
    }
}

/// Error model used throughout request parsing, validation, and proxying.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    InvalidRequest {
        message: String,
        param: Option<String>,
        code: Option<String>,
        status: StatusCode,
    },
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    BadMultipart(String),
    #[error("{message}")]
    Upstream {
        kind: UpstreamKind,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates a `401 Unauthorized` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates an `invalid_request_error` payload with status `400`.
    pub fn invalid_request(
        message: impl Into<String>,
        param: Option<&str>,
        code: Option<&str>,
    ) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: param.map(ToOwned::to_owned),
            code: code.map(ToOwned::to_owned),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Creates a `413 Payload Too Large` style error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: Some("file".to_string()),
            code: Some("file_too_large".to_string()),
            status: StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Creates a `415 Unsupported Media Type` style error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(message.into())
    }

    /// Creates a multipart parsing/shape validation error.
    pub fn bad_multipart(message: impl Into<String>) -> Self {
        Self::BadMultipart(message.into())
    }

    /// Creates an upstream provider error with the given subkind.
    pub fn upstream(kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            kind,
            message: message.into(),
        }
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Debug, Serialize)]
struct OpenAiErrorPayload {
    error: OpenAiError,
}

#[derive(Debug, Serialize)]
struct OpenAiError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: "authentication_error".to_string(),
                        param: None,
                        code: Some("invalid_api_key".to_string()),
                    },
                },
            ),
            AppError::InvalidRequest {
                message,
                param,
                code,
                status,
            } => (
                status,
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: "invalid_request_error".to_string(),
                        param,
                        code,
                    },
                },
            ),
            AppError::UnsupportedMediaType(message) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: "invalid_request_error".to_string(),
                        param: Some("file".to_string()),
                        code: Some("unsupported_media_type".to_string()),
                    },
                },
            ),
            AppError::BadMultipart(message) => (
                StatusCode::BAD_REQUEST,
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: "invalid_request_error".to_string(),
                        param: Some("file".to_string()),
                        code: Some("invalid_multipart".to_string()),
                    },
                },
            ),
            AppError::Upstream { kind, message } => (
                kind.status(),
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: kind.error_type().to_string(),
                        param: None,
                        code: Some(kind.code().to_string()),
                    },
                },
            ),
            AppError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                OpenAiErrorPayload {
                    error: OpenAiError {
                        message,
                        error_type: "server_error".to_string(),
                        param: None,
                        code: Some("internal_error".to_string()),
                    },
                },
            ),
        };

        (status, Json(payload)).into_response()
    }
}
