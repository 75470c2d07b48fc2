//! HTTP API surface compatible with the OpenAI audio transcription endpoint.
//!
//! This module owns request parsing, bearer pass-through, input validation,
//! the cache-then-upstream dispatch flow, and the observability endpoints,
//! while delegating provider calls to a [`TranscriptionProvider`]
//! implementation.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, info};

use crate::audio::{mime_type_for, validate_extension};
use crate::cache::TranscriptCache;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::fingerprint::fingerprint;
use crate::formats::{translate, ResponseFormat};
use crate::metrics::GatewayMetrics;
use crate::upstream::{TranscriptionProvider, UpstreamRequest};

/// Human-readable service name returned by the health endpoint.
pub const APP_NAME: &str = "whisper-gemini-gateway";
/// Service version string returned by the health endpoint.
pub const APP_VERSION: &str = "0.1.0";

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    /// Bounded transcription response cache.
    pub cache: TranscriptCache,
    /// Active upstream provider implementation.
    pub provider: Arc<dyn TranscriptionProvider>,
    /// Aggregate counters for /health and /metrics.
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Constructs shared handler state.
    pub fn new(
        cfg: AppConfig,
        cache: TranscriptCache,
        provider: Arc<dyn TranscriptionProvider>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            cfg,
            cache,
            provider,
            metrics,
        }
    }
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Slack above the file limit covers multipart framing and text fields.
    let body_limit = state.cfg.max_file_bytes.saturating_add(64 * 1024);
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/audio/transcriptions", post(audio_transcriptions))
        .route("/cache/clear", post(cache_clear))
        .route("/warmup", post(warmup))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Reports service status and the optimization snapshot (`GET /health`).
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot();
    Json(json!({
        "status": "ok",
        "name": APP_NAME,
        "version": APP_VERSION,
        "optimizations": {
            "cache_enabled": state.cfg.cache_enabled,
            "streaming_enabled": state.cfg.streaming_enabled,
        },
        "system": {
            "prewarmed": snapshot.prewarmed,
            "active_connections": snapshot.active_connections,
            "cache_size": state.cache.len(),
        },
    }))
}

/// Reports performance counters (`GET /metrics`).
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot();
    Json(json!({
        "cache_stats": state.cache.stats(),
        "connections": {
            "active": snapshot.active_connections,
            "max": state.cfg.max_connections,
        },
        "requests": {
            "total": snapshot.requests,
            "upstream_calls": snapshot.upstream_calls,
            "upstream_failures": snapshot.upstream_failures,
        },
    }))
}

/// Empties the response cache (`POST /cache/clear`).
pub async fn cache_clear(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    extract_bearer(&headers)?;
    let removed = state.cache.clear();
    info!(removed, "cache cleared");
    Ok(Json(json!({"cleared": true, "entries_removed": removed})))
}

/// Primes an upstream connection ahead of the first request (`POST /warmup`).
pub async fn warmup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let api_key = extract_bearer(&headers)?;
    state.provider.warm_up(&api_key).await?;
    state.metrics.mark_prewarmed();
    info!("upstream connection prewarmed");
    Ok(Json(json!({"warmed": true})))
}

/// Handles speech-to-text transcription requests
/// (`POST /v1/audio/transcriptions`).
pub async fn audio_transcriptions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let started = Instant::now();
    state.metrics.record_request();

    let api_key = extract_bearer(&headers)?;
    let form = parse_audio_form(&mut multipart, state.cfg.max_file_bytes).await?;
    let validated_ms = started.elapsed().as_millis() as u64;

    let key = fingerprint(&form.bytes, form.prompt.as_deref(), form.language.as_deref());

    if state.cfg.cache_enabled {
        if let Some(text) = state.cache.get(&key) {
            info!(
                bytes = form.bytes.len(),
                extension = %form.extension,
                format = %form.response_format,
                total_ms = started.elapsed().as_millis() as u64,
                "transcription served from cache"
            );
            return Ok(translate(&text, form.response_format, form.language.as_deref()));
        }
    }

    state.metrics.record_upstream_call();
    let request = UpstreamRequest {
        api_key,
        audio: form.bytes.clone(),
        mime_type: mime_type_for(&form.extension).to_string(),
        language: form.language.clone(),
        prompt: form.prompt.clone(),
    };

    let text = match state.provider.transcribe(request).await {
        Ok(text) => text,
        Err(err) => {
            state.metrics.record_upstream_failure();
            return Err(err);
        }
    };

    if state.cfg.cache_enabled {
        state.cache.put(key, text.clone());
    }

    info!(
        bytes = form.bytes.len(),
        extension = %form.extension,
        model = %form.model,
        format = %form.response_format,
        validated_ms,
        total_ms = started.elapsed().as_millis() as u64,
        chars = text.len(),
        "transcription completed"
    );

    Ok(translate(&text, form.response_format, form.language.as_deref()))
}

struct AudioForm {
    extension: String,
    bytes: Bytes,
    model: String,
    language: Option<String>,
    prompt: Option<String>,
    response_format: ResponseFormat,
}

/// Parses and validates multipart form fields for the transcription endpoint.
async fn parse_audio_form(
    multipart: &mut Multipart,
    max_file_bytes: usize,
) -> Result<AudioForm, AppError> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Bytes> = None;
    let mut model = "whisper-1".to_string();
    let mut language: Option<String> = None;
    let mut prompt: Option<String> = None;
    let mut response_format = ResponseFormat::Json;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_multipart(format!("invalid multipart body: {err}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| AppError::bad_multipart("file field is missing filename"))?;
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_multipart(format!("failed to read file bytes: {err}"))
                })?;
                file_name = Some(filename);
                file_bytes = Some(bytes);
            }
            "model" => {
                model = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_multipart(format!("invalid model field: {err}")))?
                    .trim()
                    .to_string();
            }
            "language" => {
                language = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| {
                            AppError::bad_multipart(format!("invalid language field: {err}"))
                        })?
                        .trim()
                        .to_string(),
                )
                .filter(|v| !v.is_empty());
            }
            "prompt" => {
                prompt = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| {
                            AppError::bad_multipart(format!("invalid prompt field: {err}"))
                        })?
                        .trim()
                        .to_string(),
                )
                .filter(|v| !v.is_empty());
            }
            "response_format" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| {
                        AppError::bad_multipart(format!("invalid response_format field: {err}"))
                    })?
                    .trim()
                    .to_string();
                if !raw.is_empty() {
                    response_format = ResponseFormat::parse(&raw)?;
                }
            }
            _ => {}
        }
    }

    let filename = file_name.ok_or_else(|| {
        AppError::invalid_request("missing required multipart field: file", Some("file"), None)
    })?;
    let extension = validate_extension(&filename)?;
    let bytes = file_bytes
        .ok_or_else(|| AppError::invalid_request("missing file content", Some("file"), None))?;
    if bytes.is_empty() {
        return Err(AppError::invalid_request(
            "uploaded file is empty",
            Some("file"),
            Some("empty_file"),
        ));
    }
    if bytes.len() > max_file_bytes {
        return Err(AppError::payload_too_large(format!(
            "uploaded file is {} bytes; maximum is {max_file_bytes}",
            bytes.len()
        )));
    }

    debug!(
        filename = %filename,
        bytes = bytes.len(),
        model = %model,
        "multipart form accepted"
    );

    Ok(AudioForm {
        extension,
        bytes,
        model,
        language,
        prompt,
        response_format,
    })
}

/// Extracts the provider API key from the `Authorization` header.
///
/// Any non-empty bearer token is accepted; the gateway forwards it to the
/// provider per request and never stores or verifies it itself.
fn extract_bearer(headers: &HeaderMap) -> Result<String, AppError> {
    let Some(raw) = headers.get(header::AUTHORIZATION) else {
        return Err(AppError::unauthorized("missing bearer token"));
    };

    let value = raw
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts
        .next()
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    let token = parts
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::cache::TranscriptCache;
    use crate::config::AppConfig;
    use crate::error::{AppError, UpstreamKind};
    use crate::metrics::GatewayMetrics;
    use crate::upstream::{TranscriptionProvider, UpstreamRequest};

    use super::{build_router, AppState};

    struct MockProvider {
        transcribe_calls: AtomicUsize,
        warmup_calls: AtomicUsize,
        fail_with: Option<UpstreamKind>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                transcribe_calls: AtomicUsize::new(0),
                warmup_calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(kind: UpstreamKind) -> Self {
            Self {
                fail_with: Some(kind),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.transcribe_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptionProvider for MockProvider {
        async fn transcribe(&self, _req: UpstreamRequest) -> Result<String, AppError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(kind) => Err(AppError::upstream(kind, "mock upstream failure")),
                None => Ok("hello world".to_string()),
            }
        }

        async fn warm_up(&self, _api_key: &str) -> Result<(), AppError> {
            self.warmup_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_cfg() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache_enabled: true,
            cache_capacity: 16,
            cache_ttl: Duration::from_secs(3600),
            streaming_enabled: true,
            streaming_threshold_bytes: 8 * 1024 * 1024,
            max_file_bytes: 1024 * 1024,
            max_connections: 4,
            upstream_timeout: Duration::from_secs(30),
            gemini_base_url: "http://127.0.0.1:0".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
        }
    }

    fn app_with(cfg: AppConfig, provider: Arc<MockProvider>) -> axum::Router {
        let cache = TranscriptCache::new(cfg.cache_capacity, cfg.cache_ttl);
        let state = Arc::new(AppState::new(
            cfg,
            cache,
            provider,
            Arc::new(GatewayMetrics::default()),
        ));
        build_router(state)
    }

    fn app() -> (axum::Router, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider::new());
        (app_with(test_cfg(), Arc::clone(&provider)), provider)
    }

    fn multipart_body(boundary: &str, filename: &str, content: &[u8], extra: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
        for (name, value) in extra {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    fn transcription_request(auth: Option<&str>, filename: &str, extra: &[(&str, &str)]) -> Request<Body> {
        let boundary = "X-BOUNDARY";
        let body = multipart_body(boundary, filename, b"fake-audio-bytes", extra);
        let mut builder = Request::builder()
            .uri("/v1/audio/transcriptions")
            .method("POST")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(token) = auth {
            builder = builder.header("Authorization", token);
        }
        builder.body(Body::from(body)).expect("request")
    }

    async fn parse_json_response(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn transcription_requires_bearer_token() {
        let (app, provider) = app();

        let res = app
            .oneshot(transcription_request(None, "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["error"]["type"], "authentication_error");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_rejects_unlisted_extension_without_upstream_call() {
        let (app, provider) = app();

        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "notes.txt", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["error"]["code"], "unsupported_media_type");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_rejects_missing_file_field() {
        let (app, provider) = app();
        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-1\r\n--{b}--\r\n",
            b = boundary
        );

        let req = Request::builder()
            .uri("/v1/audio/transcriptions")
            .method("POST")
            .header("Authorization", "Bearer k")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");

        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_rejects_oversized_file_without_upstream_call() {
        let mut cfg = test_cfg();
        cfg.max_file_bytes = 8;
        let provider = Arc::new(MockProvider::new());
        let app = app_with(cfg, Arc::clone(&provider));

        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "big.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["error"]["code"], "file_too_large");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_rejects_unknown_response_format() {
        let (app, provider) = app();

        let res = app
            .oneshot(transcription_request(
                Some("Bearer k"),
                "ok.wav",
                &[("response_format", "srt")],
            ))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["error"]["code"], "invalid_response_format");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_returns_json_payload_by_default() {
        let (app, _provider) = app();

        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let payload = parse_json_response(res).await;
        assert_eq!(payload, serde_json::json!({"text": "hello world"}));
    }

    #[tokio::test]
    async fn transcription_returns_plain_text_when_requested() {
        let (app, _provider) = app();

        let res = app
            .oneshot(transcription_request(
                Some("Bearer k"),
                "ok.wav",
                &[("response_format", "text")],
            ))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = to_bytes(res.into_body(), 1024).await.expect("body bytes");
        assert_eq!(&bytes[..], b"hello world");
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache_after_the_first_call() {
        let (app, provider) = app();

        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(transcription_request(
                    Some("Bearer k"),
                    "ok.wav",
                    &[("language", "en")],
                ))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn differing_hints_bypass_the_cache() {
        let (app, provider) = app();

        for language in ["en", "ru"] {
            let res = app
                .clone()
                .oneshot(transcription_request(
                    Some("Bearer k"),
                    "ok.wav",
                    &[("language", language)],
                ))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn expired_entries_trigger_a_fresh_upstream_call() {
        let mut cfg = test_cfg();
        cfg.cache_ttl = Duration::ZERO;
        let provider = Arc::new(MockProvider::new());
        let app = app_with(cfg, Arc::clone(&provider));

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_calls_upstream() {
        let mut cfg = test_cfg();
        cfg.cache_enabled = false;
        let provider = Arc::new(MockProvider::new());
        let app = app_with(cfg, Arc::clone(&provider));

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn upstream_rate_limit_maps_to_429() {
        let provider = Arc::new(MockProvider::failing(UpstreamKind::RateLimited));
        let app = app_with(test_cfg(), Arc::clone(&provider));

        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["error"]["type"], "rate_limit_error");
    }

    #[tokio::test]
    async fn upstream_transport_failure_maps_to_502() {
        let provider = Arc::new(MockProvider::failing(UpstreamKind::Transport));
        let app = app_with(test_cfg(), Arc::clone(&provider));

        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn failed_upstream_calls_are_not_cached() {
        let provider = Arc::new(MockProvider::failing(UpstreamKind::Transport));
        let app = app_with(test_cfg(), Arc::clone(&provider));

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        }

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn health_reports_optimizations_and_cache_size() {
        let (app, _provider) = app();

        let res = app
            .clone()
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/health")
            .method("GET")
            .body(Body::empty())
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["optimizations"]["cache_enabled"], true);
        assert_eq!(payload["system"]["cache_size"], 1);
        assert_eq!(payload["system"]["prewarmed"], false);
    }

    #[tokio::test]
    async fn metrics_report_hits_and_misses() {
        let (app, _provider) = app();

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
                .await
                .expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }

        let req = Request::builder()
            .uri("/metrics")
            .method("GET")
            .body(Body::empty())
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["cache_stats"]["size"], 1);
        assert_eq!(payload["cache_stats"]["hits"], 1);
        assert_eq!(payload["cache_stats"]["misses"], 1);
        assert_eq!(payload["requests"]["total"], 2);
        assert_eq!(payload["requests"]["upstream_calls"], 1);
    }

    #[tokio::test]
    async fn cache_clear_requires_auth_and_empties_the_cache() {
        let (app, provider) = app();

        let res = app
            .clone()
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let unauthenticated = Request::builder()
            .uri("/cache/clear")
            .method("POST")
            .body(Body::empty())
            .expect("request");
        let res = app.clone().oneshot(unauthenticated).await.expect("response");
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/cache/clear")
            .method("POST")
            .header("Authorization", "Bearer k")
            .body(Body::empty())
            .expect("request");
        let res = app.clone().oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["cleared"], true);
        assert_eq!(payload["entries_removed"], 1);

        // Next identical request misses and reaches upstream again.
        let res = app
            .oneshot(transcription_request(Some("Bearer k"), "ok.wav", &[]))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn warmup_calls_provider_and_flags_health() {
        let (app, provider) = app();

        let req = Request::builder()
            .uri("/warmup")
            .method("POST")
            .header("Authorization", "bearer k")
            .body(Body::empty())
            .expect("request");
        let res = app.clone().oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);

        let payload = parse_json_response(res).await;
        assert_eq!(payload["warmed"], true);
        assert_eq!(provider.warmup_calls.load(Ordering::SeqCst), 1);

        let req = Request::builder()
            .uri("/health")
            .method("GET")
            .body(Body::empty())
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        let payload = parse_json_response(res).await;
        assert_eq!(payload["system"]["prewarmed"], true);
    }
}
