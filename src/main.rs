mod api;
mod audio;
mod cache;
mod config;
mod error;
mod fingerprint;
mod formats;
mod metrics;
mod upstream;

use std::sync::Arc;

use tracing::info;

use crate::api::{build_router, AppState};
use crate::cache::TranscriptCache;
use crate::config::AppConfig;
use crate::metrics::GatewayMetrics;
use crate::upstream::build_provider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whisper_gemini_gateway=info,axum=info".into()),
        )
        .compact()
        .init();

    let cfg = AppConfig::from_env()?;
    let metrics = Arc::new(GatewayMetrics::default());
    let cache = TranscriptCache::new(cfg.cache_capacity, cfg.cache_ttl);
    let provider = build_provider(&cfg, Arc::clone(&metrics))?;
    let state = Arc::new(AppState::new(cfg.clone(), cache, provider, metrics));

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        model = %cfg.gemini_model,
        cache_enabled = cfg.cache_enabled,
        cache_capacity = cfg.cache_capacity,
        streaming_enabled = cfg.streaming_enabled,
        max_connections = cfg.max_connections,
        "starting whisper-gemini-gateway"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
