//! FFmpeg command building.

use std::path::{Path, PathBuf};

use tracing::warn;

use mconv_models::encoding::VIDEO_CONTAINER;
use mconv_models::{AudioEncoding, AudioProfile, EncodeProfile, VideoProfile};

/// Only errors reach stderr besides the progress blocks.
const LOG_LEVEL: &str = "error";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add an output option and its value.
    fn option(self, flag: &str, value: impl Into<String>) -> Self {
        self.output_arg(flag).output_arg(value)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.option("-vf", filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.option("-c:v", codec)
    }

    pub fn video_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.option("-b:v", bitrate)
    }

    /// Encoder speed/quality preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.option("-preset", preset)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.option("-c:a", codec)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.option("-b:a", bitrate)
    }

    /// Variable-bitrate audio quality factor.
    pub fn audio_quality(self, quality: u8) -> Self {
        self.option("-q:a", quality.to_string())
    }

    pub fn sample_rate(self, hz: u32) -> Self {
        self.option("-ar", hz.to_string())
    }

    pub fn channels(self, channels: u8) -> Self {
        self.option("-ac", channels.to_string())
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Force the output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.option("-f", format)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(12 + self.output_args.len());

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(LOG_LEVEL.to_string());

        // Machine-readable progress on stderr instead of the \r stats line
        args.push("-nostats".to_string());
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Build the full argument vector for a resolved profile.
///
/// Pure: the same profile and paths always give the same arguments.
pub fn build_args(profile: &EncodeProfile, input: &Path, output: &Path) -> Vec<String> {
    conversion_command(profile, input, output).build_args()
}

/// FFmpeg command for a resolved profile.
pub fn conversion_command(profile: &EncodeProfile, input: &Path, output: &Path) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, output);
    match profile {
        EncodeProfile::Video(video) => video_transcode(cmd, video),
        EncodeProfile::Audio(audio) => audio_extraction(cmd, audio),
    }
}

fn video_transcode(cmd: FfmpegCommand, profile: &VideoProfile) -> FfmpegCommand {
    // -2 keeps the aspect ratio with an even width, which libx264 requires
    cmd.video_filter(format!("scale=-2:{}", profile.height))
        .video_codec(&profile.video_codec)
        .preset(&profile.speed_preset)
        .video_bitrate(&profile.video_bitrate)
        .audio_codec(&profile.audio_codec)
        .audio_bitrate(&profile.audio_bitrate)
        .option("-movflags", "+faststart")
        .format(VIDEO_CONTAINER)
}

fn audio_extraction(cmd: FfmpegCommand, profile: &AudioProfile) -> FfmpegCommand {
    let cmd = cmd.no_video().audio_codec(profile.encoding.codec());
    match profile.encoding {
        AudioEncoding::Mp3 { quality } | AudioEncoding::Vorbis { quality } => {
            cmd.audio_quality(quality)
        }
        AudioEncoding::Pcm {
            sample_rate,
            channels,
        } => cmd.sample_rate(sample_rate).channels(channels),
        AudioEncoding::StreamCopy => cmd,
    }
}

/// Resolve the FFmpeg executable.
///
/// Order: `override_path` if it exists, `ffmpeg` on `PATH`, then the bare
/// program name so the spawn error names the missing tool.
pub fn locate_ffmpeg(override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path {
        if path.exists() {
            return path.to_path_buf();
        }
        warn!(path = %path.display(), "Configured FFmpeg path does not exist, searching PATH");
    }

    which::which("ffmpeg").unwrap_or_else(|_| {
        warn!("FFmpeg not found in PATH, conversions will fail until it is installed");
        PathBuf::from("ffmpeg")
    })
}

/// Check whether `path` points at a runnable executable.
pub fn encoder_available(path: &Path) -> bool {
    which::which(path).is_ok()
}
