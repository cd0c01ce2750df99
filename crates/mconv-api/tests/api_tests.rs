//! API integration tests.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mconv_api::{create_router, ApiConfig, AppState};
use mconv_media::EncoderConfig;

const BOUNDARY: &str = "mconv-test-boundary";

struct Encoders {
    _dir: TempDir,
    echo_args: PathBuf,
    reject: PathBuf,
    hang: PathBuf,
}

/// Stand-in encoders, written once before any test spawns a process.
fn encoders() -> &'static Encoders {
    static ENCODERS: OnceLock<Encoders> = OnceLock::new();
    ENCODERS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        Encoders {
            echo_args: write(
                "echo-args",
                "#!/bin/sh\nfor last; do :; done\nprintf '%s\\n' \"$@\" > \"$last\"\n",
            ),
            reject: write(
                "reject",
                "#!/bin/sh\necho 'in.bin: Invalid data found when processing input' >&2\nexit 1\n",
            ),
            hang: write("hang", "#!/bin/sh\nexec sleep 30\n"),
            _dir: dir,
        }
    })
}

fn router(encoder: &Path, temp: &TempDir, config: ApiConfig) -> Router {
    let encoder = EncoderConfig::default()
        .with_ffmpeg_path(encoder)
        .with_temp_dir(temp.path())
        .with_encode_timeout(Duration::from_secs(20));
    create_router(AppState::new(config, encoder), None)
}

/// Multipart body with an optional file part and text parts.
fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_LENGTH, body.len())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_ready_reports_encoder() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["checks"]["encoder"]["status"], "ok");

    let app = router(
        Path::new("/nonexistent/ffmpeg_xyz_12345"),
        &temp,
        ApiConfig::default(),
    );
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_convert_video_returns_attachment() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());
    let body = multipart_body(Some(("clip.mov", &b"fake movie bytes"[..])), &[("preset", "480p")]);

    let response = app.oneshot(upload("/convert-video", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"clip.mp4\""
    );
    let args = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(args.lines().any(|a| a == "scale=-2:480"));

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_extract_audio_defaults_to_mp3() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());
    let body = multipart_body(Some(("talk.mp4", &b"fake"[..])), &[]);

    let response = app.oneshot(upload("/extract-audio", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mp3");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"talk.mp3\""
    );
    let args = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(args.lines().any(|a| a == "libmp3lame"));
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());
    let body = multipart_body(None, &[("format", "wav")]);

    let response = app.oneshot(upload("/extract-audio", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "no_input_provided");
    assert_eq!(json["detail"], "No input file provided");
}

#[tokio::test]
async fn test_non_multipart_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().echo_args, &temp, ApiConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/convert-video")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn test_undecodable_input_is_unprocessable() {
    let temp = TempDir::new().unwrap();
    let app = router(&encoders().reject, &temp, ApiConfig::default());
    let body = multipart_body(Some(("in.bin", &b"garbage"[..])), &[("preset", "720p")]);

    let response = app.oneshot(upload("/convert-video", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "unsupported_input");
    assert!(json["detail"].as_str().unwrap().contains("exited with code 1"));
}

#[tokio::test]
async fn test_encoder_timeout_is_gateway_timeout() {
    let temp = TempDir::new().unwrap();
    let encoder = EncoderConfig::default()
        .with_ffmpeg_path(&encoders().hang)
        .with_temp_dir(temp.path())
        .with_encode_timeout(Duration::from_millis(300));
    let app = create_router(AppState::new(ApiConfig::default(), encoder), None);
    let body = multipart_body(Some(("a.mp4", &b"data"[..])), &[]);

    let response = app.oneshot(upload("/convert-video", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "process_timed_out");
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_internal_detail_depends_on_environment() {
    let temp = TempDir::new().unwrap();
    let missing = Path::new("/nonexistent/ffmpeg_xyz_12345");
    let body = || multipart_body(Some(("a.mp4", &b"data"[..])), &[]);

    let app = router(missing, &temp, ApiConfig::default());
    let response = app.oneshot(upload("/convert-video", body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "spawn_failure");
    assert!(json["detail"].as_str().unwrap().contains("ffmpeg_xyz_12345"));

    let production = ApiConfig {
        environment: "production".to_string(),
        ..ApiConfig::default()
    };
    let app = router(missing, &temp, production);
    let response = app.oneshot(upload("/convert-video", body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["code"], "spawn_failure");
    assert_eq!(json["detail"], "An internal error occurred");
}

#[tokio::test]
async fn test_production_keeps_client_error_details() {
    let temp = TempDir::new().unwrap();
    let production = ApiConfig {
        environment: "production".to_string(),
        ..ApiConfig::default()
    };
    let app = router(&encoders().echo_args, &temp, production);
    let body = multipart_body(None, &[("preset", "480p")]);

    let response = app.oneshot(upload("/convert-video", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "No input file provided");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = ApiConfig {
        max_upload_bytes: 1024,
        ..ApiConfig::default()
    };
    let app = router(&encoders().echo_args, &temp, config);
    let body = multipart_body(Some(("big.mp4", &[0u8; 8192][..])), &[]);

    let response = app.oneshot(upload("/convert-video", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
