//! Conversion job identifiers and requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of conversion a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Re-encode video to an MP4 at a preset resolution
    VideoTranscode,
    /// Drop the video stream and keep (or re-encode) the audio
    AudioExtraction,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::VideoTranscode => "video_transcode",
            JobKind::AudioExtraction => "audio_extraction",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file plus the conversion that should be applied to it.
///
/// Fields are private so the request cannot change after construction.
#[derive(Clone)]
pub struct ConversionRequest {
    source_bytes: Vec<u8>,
    source_extension_hint: String,
    source_file_name: Option<String>,
    job_kind: JobKind,
    profile_selector: Option<String>,
}

impl ConversionRequest {
    /// Build a request.
    ///
    /// The extension hint is taken from `source_file_name` when it has one.
    pub fn new(
        job_kind: JobKind,
        source_bytes: Vec<u8>,
        source_file_name: Option<String>,
        profile_selector: Option<String>,
    ) -> Self {
        let source_extension_hint = source_file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self {
            source_bytes,
            source_extension_hint,
            source_file_name,
            job_kind,
            profile_selector,
        }
    }

    /// Video transcode request; `preset` is one of the named presets (e.g. "480p").
    pub fn video(
        source_bytes: Vec<u8>,
        source_file_name: Option<String>,
        preset: Option<String>,
    ) -> Self {
        Self::new(JobKind::VideoTranscode, source_bytes, source_file_name, preset)
    }

    /// Audio extraction request; `format` is the target container (e.g. "wav").
    pub fn audio(
        source_bytes: Vec<u8>,
        source_file_name: Option<String>,
        format: Option<String>,
    ) -> Self {
        Self::new(JobKind::AudioExtraction, source_bytes, source_file_name, format)
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    pub fn source_extension_hint(&self) -> &str {
        &self.source_extension_hint
    }

    pub fn source_file_name(&self) -> Option<&str> {
        self.source_file_name.as_deref()
    }

    pub fn job_kind(&self) -> JobKind {
        self.job_kind
    }

    pub fn profile_selector(&self) -> Option<&str> {
        self.profile_selector.as_deref()
    }

    /// Filename stem of the upload, used to name the converted file.
    pub fn source_stem(&self) -> Option<&str> {
        self.source_file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
    }
}

// Uploads can be hundreds of megabytes; never dump them into logs.
impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("source_len", &self.source_bytes.len())
            .field("source_extension_hint", &self.source_extension_hint)
            .field("source_file_name", &self.source_file_name)
            .field("job_kind", &self.job_kind)
            .field("profile_selector", &self.profile_selector)
            .finish()
    }
}
