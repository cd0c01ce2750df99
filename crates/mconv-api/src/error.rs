//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use mconv_media::{ConversionError, ErrorKind};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Conversion(err) => match err.kind() {
                ErrorKind::NoInputProvided => StatusCode::BAD_REQUEST,
                ErrorKind::ProcessTimedOut => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::ProcessExitedNonZero if err.is_bad_input() => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Conversion(err) if err.is_bad_input() && err.exit_code().is_some() => {
                "unsupported_input"
            }
            ApiError::Conversion(err) => err.kind().as_str(),
        }
    }

    fn is_internal(&self) -> bool {
        match self {
            ApiError::Conversion(err) => matches!(
                err.kind(),
                ErrorKind::StagingFailure
                    | ErrorKind::SpawnFailure
                    | ErrorKind::OutputReadFailure
                    | ErrorKind::CleanupFailure
            ),
            ApiError::BadRequest(_) | ApiError::PayloadTooLarge(_) => false,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Conversion(err @ ConversionError::ProcessExitedNonZero { .. })
                if err.is_bad_input() =>
            {
                format!("Unsupported or invalid input file ({})", err)
            }
            _ => self.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

/// Marks a response whose detail is server-side only.
///
/// Production deployments replace the body through
/// [`crate::middleware::hide_internal_errors`].
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorDetail {
    pub code: &'static str,
}

pub const INTERNAL_ERROR_DETAIL: &str = "An internal error occurred";

/// JSON error body with the given status.
pub fn error_response(status: StatusCode, detail: String, code: &str) -> Response {
    let body = ErrorResponse {
        detail,
        code: Some(code.to_string()),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let mut response = error_response(self.status_code(), self.detail(), code);
        if self.is_internal() {
            response
                .extensions_mut()
                .insert(InternalErrorDetail { code });
        }
        response
    }
}
