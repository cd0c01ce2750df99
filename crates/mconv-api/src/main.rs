//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mconv_api::{create_router, metrics, ApiConfig, AppState};
use mconv_media::{encoder_available, EncoderConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting mconv-api");

    let config = ApiConfig::from_env();
    let encoder = EncoderConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        max_upload_bytes = config.max_upload_bytes,
        "API config"
    );
    info!(
        ffmpeg = %encoder.ffmpeg_path.display(),
        timeout_secs = encoder.encode_timeout.as_secs(),
        max_concurrent = encoder.max_concurrent_encodes,
        temp_dir = %encoder.temp_dir.display(),
        "Encoder config"
    );
    if !encoder_available(&encoder.ffmpeg_path) {
        warn!(
            ffmpeg = %encoder.ffmpeg_path.display(),
            "Encoder is not runnable; conversions will fail until it is installed"
        );
    }

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    let state = AppState::new(config, encoder);
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mconv=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
