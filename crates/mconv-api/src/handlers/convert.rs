//! Conversion handlers.
//!
//! Both endpoints take a multipart upload with a `file` part and an optional
//! text part naming the target (`preset` or `format`), and answer with the
//! converted file as an attachment.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use mconv_media::ConvertedMedia;
use mconv_models::{ConversionRequest, JobKind};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const PRESET_FIELD: &str = "preset";
const FORMAT_FIELD: &str = "format";

/// Fields pulled out of a conversion upload.
#[derive(Debug, Default)]
struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
    selector: Option<String>,
}

/// Transcode an uploaded video to MP4 at the requested preset.
pub async fn convert_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    convert(state, multipart, JobKind::VideoTranscode, PRESET_FIELD).await
}

/// Extract the audio track of an upload in the requested format.
pub async fn extract_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    convert(state, multipart, JobKind::AudioExtraction, FORMAT_FIELD).await
}

async fn convert(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
    kind: JobKind,
    selector_field: &str,
) -> ApiResult<Response> {
    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let upload = read_upload(multipart, selector_field).await?;

    let request = ConversionRequest::new(kind, upload.bytes, upload.file_name, upload.selector);
    let media = state.converter.convert(request).await?;

    Ok(media_response(media))
}

async fn read_upload(mut multipart: Multipart, selector_field: &str) -> ApiResult<Upload> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            upload.file_name = field.file_name().map(str::to_string);
            upload.bytes = field.bytes().await?.to_vec();
        } else if name == selector_field {
            let value = field.text().await?;
            upload.selector = Some(value).filter(|v| !v.trim().is_empty());
        } else {
            debug!(field = %name, "Ignoring unexpected multipart field");
        }
    }

    Ok(upload)
}

fn media_response(media: ConvertedMedia) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_file_name(&media.file_name)
    );
    (
        [
            (header::CONTENT_TYPE, media.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        media.bytes,
    )
        .into_response()
}

/// Printable ASCII only, without quotes or backslashes.
fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
