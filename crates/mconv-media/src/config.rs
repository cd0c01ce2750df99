//! Encoder configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::command::locate_ffmpeg;

/// Wall-clock budget for one encoder run, counted from process start.
pub const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(300);
/// Tail of encoder stderr kept for error reporting.
pub const DEFAULT_MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

/// Immutable encoder settings, built once at startup and shared by all jobs.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Resolved FFmpeg executable
    pub ffmpeg_path: PathBuf,
    /// Deadline for a single encoder process
    pub encode_timeout: Duration,
    /// Maximum encoder processes running at once
    pub max_concurrent_encodes: usize,
    /// Directory for staged inputs and encoder outputs
    pub temp_dir: PathBuf,
    /// Maximum bytes of stderr retained per job
    pub max_diagnostic_bytes: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            encode_timeout: DEFAULT_ENCODE_TIMEOUT,
            max_concurrent_encodes: default_concurrency(),
            temp_dir: std::env::temp_dir(),
            max_diagnostic_bytes: DEFAULT_MAX_DIAGNOSTIC_BYTES,
        }
    }
}

impl EncoderConfig {
    /// Create config from environment variables.
    ///
    /// The FFmpeg path falls back from `MCONV_FFMPEG_PATH` to `ffmpeg` on
    /// `PATH`, then to the bare program name.
    pub fn from_env() -> Self {
        let ffmpeg_override = std::env::var("MCONV_FFMPEG_PATH").ok().map(PathBuf::from);

        Self {
            ffmpeg_path: locate_ffmpeg(ffmpeg_override.as_deref()),
            encode_timeout: Duration::from_secs(
                std::env::var("MCONV_ENCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_ENCODE_TIMEOUT.as_secs()),
            ),
            max_concurrent_encodes: std::env::var("MCONV_MAX_CONCURRENT_ENCODES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or_else(default_concurrency),
            temp_dir: std::env::var("MCONV_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            max_diagnostic_bytes: std::env::var("MCONV_MAX_DIAGNOSTIC_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_DIAGNOSTIC_BYTES),
        }
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_encode_timeout(mut self, timeout: Duration) -> Self {
        self.encode_timeout = timeout;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_max_concurrent_encodes(mut self, n: usize) -> Self {
        self.max_concurrent_encodes = n.max(1);
        self
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
