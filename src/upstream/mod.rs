//! Provider abstraction for remote transcription services.
//!
//! The HTTP layer depends on the [`TranscriptionProvider`] trait instead of a
//! concrete implementation, which keeps request handling decoupled from the
//! provider wire protocol and lets tests stub the upstream entirely.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::GatewayMetrics;

pub mod gemini;

/// Input payload forwarded to the upstream provider.
///
/// The caller's bearer token travels with each request; the gateway never
/// stores it.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// Provider API key extracted from the incoming `Authorization` header.
    pub api_key: String,
    /// Raw audio bytes, forwarded opaquely.
    pub audio: Bytes,
    /// MIME type declared on the upload, derived from the file extension.
    pub mime_type: String,
    /// Optional language hint such as `"en"`.
    pub language: Option<String>,
    /// Optional context prompt to bias transcription.
    pub prompt: Option<String>,
}

/// Provider contract implemented by upstream transcription adapters.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Uploads the audio and returns the plain transcript text.
    async fn transcribe(&self, req: UpstreamRequest) -> Result<String, AppError>;

    /// Issues a cheap authenticated call to open a pooled connection ahead of
    /// the first real request.
    async fn warm_up(&self, api_key: &str) -> Result<(), AppError>;
}

/// Builds the configured provider implementation.
pub fn build_provider(
    cfg: &AppConfig,
    metrics: Arc<GatewayMetrics>,
) -> Result<Arc<dyn TranscriptionProvider>, AppError> {
    Ok(Arc::new(gemini::GeminiProvider::new(cfg, metrics)?))
}
