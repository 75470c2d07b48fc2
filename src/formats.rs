//! Helpers for OpenAI-compatible response formatting.

use std::fmt;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AppError;

/// Output format accepted by `response_format` in the transcription endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResponseFormat {
    /// JSON object with a single `text` field.
    Json,
    /// Raw plain-text transcript body.
    Text,
    /// JSON object with transcript text plus a synthetic segment list.
    VerboseJson,
}

impl ResponseFormat {
    /// Parses a `response_format` string used by the HTTP API.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "verbose_json" => Ok(Self::VerboseJson),
            other => Err(AppError::invalid_request(
                format!("invalid response_format={other:?}; expected one of json,text,verbose_json"),
                Some("response_format"),
                Some("invalid_response_format"),
            )),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
            Self::VerboseJson => write!(f, "verbose_json"),
        }
    }
}

/// Renders a provider transcript into the requested OpenAI response shape.
///
/// The provider returns plain text with no timing information, so
/// `verbose_json` carries one synthetic segment covering the whole transcript
/// and omits `duration`/`start`/`end` instead of fabricating values.
pub fn translate(transcript: &str, format: ResponseFormat, language: Option<&str>) -> Response {
    match format {
        ResponseFormat::Json => Json(json!({"text": transcript})).into_response(),
        ResponseFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            transcript.to_string(),
        )
            .into_response(),
        ResponseFormat::VerboseJson => Json(json!({
            "task": "transcribe",
            "language": language.unwrap_or("auto"),
            "text": transcript,
            "segments": [{
                "id": 0,
                "text": transcript,
            }],
        }))
        .into_response(),
    }
}
