//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use mconv_media::encoder_available;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub active_encodes: usize,
    pub max_concurrent_encodes: usize,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub encoder: CheckStatus,
    pub temp_dir: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks that the encoder is runnable and the temp directory is usable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let encoder = state.converter.config();

    let encoder_check = {
        let start = Instant::now();
        let path = encoder.ffmpeg_path.clone();
        let available = tokio::task::spawn_blocking(move || encoder_available(&path))
            .await
            .unwrap_or(false);
        if available {
            CheckStatus::ok(start.elapsed().as_millis() as u64)
        } else {
            CheckStatus::error(format!(
                "encoder not found: {}",
                encoder.ffmpeg_path.display()
            ))
        }
    };

    let temp_dir_check = {
        let start = Instant::now();
        match tokio::fs::create_dir_all(&encoder.temp_dir).await {
            Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(format!("{}: {}", encoder.temp_dir.display(), e)),
        }
    };

    let all_ok = encoder_check.is_ok() && temp_dir_check.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            encoder: encoder_check,
            temp_dir: temp_dir_check,
        },
        active_encodes: state.converter.active_encodes(),
        max_concurrent_encodes: encoder.max_concurrent_encodes,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
