//! Gemini API client adapter.
//!
//! Mirrors the provider's file workflow: upload the media bytes, ask the
//! model to transcribe the uploaded file, then delete the file. One shared
//! `reqwest::Client` reuses connections across requests; a semaphore bounds
//! how many uploads are in flight at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, UpstreamKind};
use crate::metrics::GatewayMetrics;
use crate::upstream::{TranscriptionProvider, UpstreamRequest};

/// Chunk size for streamed uploads.
const UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

const TRANSCRIBE_RULES: &str = "Transcribe this audio to text. Rules:\n\
- Keep the original language of the speech\n\
- Remove filler words (uh, um, like)\n\
- Clean up false starts and repetitions\n\
- Output only the clean transcription text";

/// Remote transcription provider backed by the Gemini files + generateContent
/// endpoints.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    streaming_enabled: bool,
    streaming_threshold: usize,
    permits: Semaphore,
    metrics: Arc<GatewayMetrics>,
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
    uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiProvider {
    /// Builds the shared HTTP client and concurrency bound from configuration.
    pub fn new(cfg: &AppConfig, metrics: Arc<GatewayMetrics>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.upstream_timeout)
            .pool_max_idle_per_host(cfg.max_connections)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: cfg.gemini_base_url.clone(),
            model: cfg.gemini_model.clone(),
            streaming_enabled: cfg.streaming_enabled,
            streaming_threshold: cfg.streaming_threshold_bytes,
            permits: Semaphore::new(cfg.max_connections),
            metrics,
        })
    }

    async fn upload_file(&self, req: &UpstreamRequest) -> Result<UploadedFile, AppError> {
        let url = format!("{}/upload/v1beta/files?uploadType=media", self.base_url);
        let size = req.audio.len();
        let streamed = self.streaming_enabled && size >= self.streaming_threshold;
        let body = if streamed {
            chunked_body(req.audio.clone())
        } else {
            Body::from(req.audio.clone())
        };

        debug!(bytes = size, streamed, "uploading audio to gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &req.api_key)
            .header("content-type", req.mime_type.clone())
            .body(body)
            .send()
            .await
            .map_err(classify_transport)?;

        let response = check_status(response, "file upload").await?;
        let upload: FileUploadResponse = response.json().await.map_err(|err| {
            AppError::upstream(
                UpstreamKind::Transport,
                format!("invalid upload response from provider: {err}"),
            )
        })?;
        Ok(upload.file)
    }

    async fn generate_transcript(
        &self,
        req: &UpstreamRequest,
        file: &UploadedFile,
    ) -> Result<String, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let payload = json!({
            "contents": [{
                "parts": [
                    {"text": build_instruction(req.language.as_deref(), req.prompt.as_deref())},
                    {"file_data": {"mime_type": req.mime_type, "file_uri": file.uri}},
                ],
            }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &req.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let response = check_status(response, "transcription").await?;
        let generated: GenerateContentResponse = response.json().await.map_err(|err| {
            AppError::upstream(
                UpstreamKind::Transport,
                format!("invalid transcription response from provider: {err}"),
            )
        })?;

        let text = extract_text(&generated);
        if text.is_empty() {
            return Err(AppError::upstream(
                UpstreamKind::Transport,
                "provider returned an empty transcription",
            ));
        }
        Ok(text)
    }

    /// Deletes the uploaded file. Failures are logged and swallowed; the
    /// provider garbage-collects leftovers after 48 hours.
    async fn delete_file(&self, api_key: &str, file: &UploadedFile) {
        let url = format!("{}/v1beta/{}", self.base_url, file.name);
        match self
            .client
            .delete(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                debug!(file = %file.name, status = %response.status(), "file cleanup rejected");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(file = %file.name, error = %err, "file cleanup failed");
            }
        }
    }
}

#[async_trait]
impl TranscriptionProvider for GeminiProvider {
    async fn transcribe(&self, req: UpstreamRequest) -> Result<String, AppError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::internal("upstream connection pool is shut down"))?;
        let _gauge = self.metrics.track_connection();

        let upload_start = Instant::now();
        let file = self.upload_file(&req).await?;
        let upload_ms = upload_start.elapsed().as_millis() as u64;

        let generate_start = Instant::now();
        let result = self.generate_transcript(&req, &file).await;
        self.delete_file(&req.api_key, &file).await;

        match result {
            Ok(text) => {
                info!(
                    upload_ms,
                    transcribe_ms = generate_start.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "gemini transcription completed"
                );
                Ok(text)
            }
            Err(err) => {
                warn!(upload_ms, error = %err, "gemini transcription failed");
                Err(err)
            }
        }
    }

    async fn warm_up(&self, api_key: &str) -> Result<(), AppError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response, "warmup").await?;
        Ok(())
    }
}

/// Wraps the payload in a chunked stream so large uploads use
/// transfer-encoding chunked instead of one contiguous buffer. Slices are
/// zero-copy views into the shared payload.
fn chunked_body(audio: Bytes) -> Body {
    let mut chunks = Vec::with_capacity(audio.len().div_ceil(UPLOAD_CHUNK_BYTES));
    let mut offset = 0;
    while offset < audio.len() {
        let end = usize::min(offset + UPLOAD_CHUNK_BYTES, audio.len());
        chunks.push(Ok::<Bytes, std::convert::Infallible>(audio.slice(offset..end)));
        offset = end;
    }
    Body::wrap_stream(futures::stream::iter(chunks))
}

fn build_instruction(language: Option<&str>, prompt: Option<&str>) -> String {
    let mut instruction = TRANSCRIBE_RULES.to_string();
    if let Some(language) = language {
        instruction.push_str(&format!("\nLanguage: {language}"));
    }
    if let Some(prompt) = prompt {
        instruction.push_str(&format!("\nContext: {prompt}"));
    }
    instruction
}

fn extract_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn classify_transport(err: reqwest::Error) -> AppError {
    AppError::upstream(
        UpstreamKind::Transport,
        format!("provider request failed: {err}"),
    )
}

fn classify_status(status: StatusCode) -> UpstreamKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        UpstreamKind::RateLimited
    } else if status.is_client_error() {
        UpstreamKind::InvalidRequest
    } else {
        UpstreamKind::Transport
    }
}

async fn check_status(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(AppError::upstream(
        classify_status(status),
        format!("provider {operation} failed with status {status}: {body}"),
    ))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use reqwest::StatusCode;

    use crate::error::UpstreamKind;

    use super::{build_instruction, classify_status, extract_text, GenerateContentResponse};

    #[test]
    fn status_classification_covers_each_subkind() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            UpstreamKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            UpstreamKind::InvalidRequest
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            UpstreamKind::InvalidRequest
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            UpstreamKind::Transport
        );
    }

    #[test]
    fn instruction_appends_hints_when_present() {
        let bare = build_instruction(None, None);
        assert!(!bare.contains("Language:"));
        assert!(!bare.contains("Context:"));

        let hinted = build_instruction(Some("hy"), Some("meeting notes"));
        assert!(hinted.contains("Language: hy"));
        assert!(hinted.contains("Context: meeting notes"));
    }

    #[test]
    fn extract_text_joins_parts_and_trims() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": " hello"}, {"text": " world "}]}
            }]
        }))
        .expect("response");
        assert_eq!(extract_text(&response), "hello world");
    }

    #[test]
    fn extract_text_handles_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).expect("response");
        assert_eq!(extract_text(&response), "");
    }

    #[test]
    fn chunked_body_splits_on_chunk_boundaries() {
        // Indirectly validate the chunk arithmetic used by chunked_body.
        let audio = Bytes::from(vec![0u8; super::UPLOAD_CHUNK_BYTES * 2 + 1]);
        let expected = audio.len().div_ceil(super::UPLOAD_CHUNK_BYTES);
        assert_eq!(expected, 3);
        let _body = super::chunked_body(audio);
    }
}
