//! Configuration loading from environment variables.
//!
//! Values are intentionally validated early so startup fails fast with
//! actionable errors.

use std::env;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;
pub const MAX_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;
pub const MAX_MAX_CONNECTIONS: usize = 128;
pub const DEFAULT_MAX_FILE_BYTES: usize = 100 * 1024 * 1024;
pub const DEFAULT_STREAMING_THRESHOLD_BYTES: usize = 8 * 1024 * 1024;

/// Runtime configuration for the HTTP server and the upstream proxy.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `0.0.0.0`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Enables the in-process transcription response cache.
    pub cache_enabled: bool,
    /// Maximum number of resident cache entries.
    pub cache_capacity: usize,
    /// Time-to-live for cache entries.
    pub cache_ttl: Duration,
    /// Enables chunked upstream uploads for large payloads.
    pub streaming_enabled: bool,
    /// Payloads at or above this size are uploaded chunked.
    pub streaming_threshold_bytes: usize,
    /// Hard limit on the uploaded file size.
    pub max_file_bytes: usize,
    /// Bound on concurrent upstream calls and the client connection pool.
    pub max_connections: usize,
    /// End-to-end timeout for a single upstream call.
    pub upstream_timeout: Duration,
    /// Base URL of the Gemini API.
    pub gemini_base_url: String,
    /// Gemini model id used for transcription.
    pub gemini_model: String,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `0.0.0.0`)
    /// - `PORT` (default `8080`)
    /// - `CACHE_ENABLED` (default `true`)
    /// - `CACHE_CAPACITY` (default `128`, min `1`, max `10000`)
    /// - `CACHE_TTL_SECS` (default `3600`)
    /// - `STREAMING_ENABLED` (default `true`)
    /// - `STREAMING_THRESHOLD_BYTES` (default 8 MiB)
    /// - `MAX_FILE_BYTES` (default 100 MiB)
    /// - `MAX_UPSTREAM_CONNECTIONS` (default `16`, min `1`, max `128`)
    /// - `UPSTREAM_TIMEOUT_SECS` (default `300`)
    /// - `GEMINI_BASE_URL` (default `https://generativelanguage.googleapis.com`)
    /// - `GEMINI_MODEL` (default `gemini-2.5-flash`)
    pub fn from_env() -> Result<Self, AppError> {
        let host = env_str("HOST", "0.0.0.0");
        let port = env_u16("PORT", 8080)?;
        let cache_enabled = env_bool("CACHE_ENABLED", true)?;
        let cache_capacity =
            env_usize_bounded("CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY, 1, MAX_CACHE_CAPACITY)?;
        let cache_ttl = Duration::from_secs(env_u64("CACHE_TTL_SECS", 3600)?);
        let streaming_enabled = env_bool("STREAMING_ENABLED", true)?;
        let streaming_threshold_bytes = env_usize_bounded(
            "STREAMING_THRESHOLD_BYTES",
            DEFAULT_STREAMING_THRESHOLD_BYTES,
            1,
            usize::MAX,
        )?;
        let max_file_bytes =
            env_usize_bounded("MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES, 1, usize::MAX)?;
        let max_connections = env_usize_bounded(
            "MAX_UPSTREAM_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
            1,
            MAX_MAX_CONNECTIONS,
        )?;
        let upstream_timeout = Duration::from_secs(env_u64("UPSTREAM_TIMEOUT_SECS", 300)?);
        let gemini_base_url = env_str(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com",
        )
        .trim_end_matches('/')
        .to_string();
        let gemini_model = env_str("GEMINI_MODEL", "gemini-2.5-flash");

        Ok(Self {
            host,
            port,
            cache_enabled,
            cache_capacity,
            cache_ttl,
            streaming_enabled,
            streaming_threshold_bytes,
            max_file_bytes,
            max_connections,
            upstream_timeout,
            gemini_base_url,
            gemini_model,
        })
    }
}

fn env_str(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => default.to_string(),
    }
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AppError::internal(format!("invalid {name}={raw:?}; expected integer")))
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_usize_bounded(
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_usize_bounded(name, &raw, min, max)
}

fn parse_usize_bounded(name: &str, raw: &str, min: usize, max: usize) -> Result<usize, AppError> {
    let trimmed = raw.trim();
    let parsed = trimmed.parse::<usize>().map_err(|_| {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if parsed < min || parsed > max {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}
