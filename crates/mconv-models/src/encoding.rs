//! Encoding presets and resolved encoder profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobKind;

/// Video codec used for every transcode (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Encoding speed/quality preset
pub const DEFAULT_PRESET: &str = "fast";
/// Audio codec muxed into transcoded video
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Audio bitrate muxed into transcoded video
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Transcoded video is always written as MP4
pub const VIDEO_CONTAINER: &str = "mp4";
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// LAME VBR quality (0 best, 9 worst)
pub const MP3_QUALITY: u8 = 2;
/// Vorbis VBR quality (-1 worst, 10 best)
pub const OGG_QUALITY: u8 = 4;
pub const WAV_SAMPLE_RATE: u32 = 44_100;
pub const WAV_CHANNELS: u8 = 2;

/// Named video quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VideoPreset {
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
}

impl VideoPreset {
    pub const ALL: [VideoPreset; 6] = [
        VideoPreset::P240,
        VideoPreset::P360,
        VideoPreset::P480,
        VideoPreset::P720,
        VideoPreset::P1080,
        VideoPreset::P1440,
    ];

    /// Parse a preset name. Case and surrounding whitespace are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoPreset::P240 => "240p",
            VideoPreset::P360 => "360p",
            VideoPreset::P480 => "480p",
            VideoPreset::P720 => "720p",
            VideoPreset::P1080 => "1080p",
            VideoPreset::P1440 => "1440p",
        }
    }

    /// Output frame height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            VideoPreset::P240 => 240,
            VideoPreset::P360 => 360,
            VideoPreset::P480 => 480,
            VideoPreset::P720 => 720,
            VideoPreset::P1080 => 1080,
            VideoPreset::P1440 => 1440,
        }
    }

    /// Target video bitrate in FFmpeg notation.
    pub fn video_bitrate(&self) -> &'static str {
        match self {
            VideoPreset::P240 => "400k",
            VideoPreset::P360 => "800k",
            VideoPreset::P480 => "1500k",
            VideoPreset::P720 => "3000k",
            VideoPreset::P1080 => "5000k",
            VideoPreset::P1440 => "8000k",
        }
    }
}

impl fmt::Display for VideoPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio formats that are re-encoded with fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Ogg];

    /// Parse a format name. Case and surrounding whitespace are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Fixed encoder settings for this format.
    pub fn encoding(&self) -> AudioEncoding {
        match self {
            AudioFormat::Mp3 => AudioEncoding::Mp3 {
                quality: MP3_QUALITY,
            },
            AudioFormat::Wav => AudioEncoding::Pcm {
                sample_rate: WAV_SAMPLE_RATE,
                channels: WAV_CHANNELS,
            },
            AudioFormat::Ogg => AudioEncoding::Vorbis {
                quality: OGG_QUALITY,
            },
        }
    }
}

/// Fully resolved settings for a video transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    /// Preset the settings came from
    pub preset: VideoPreset,
    /// Output height; width follows the source aspect ratio
    pub height: u32,
    /// Video bitrate (e.g. "1500k")
    pub video_bitrate: String,
    /// Video codec
    pub video_codec: String,
    /// Encoder speed/quality preset
    pub speed_preset: String,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
}

impl From<VideoPreset> for VideoProfile {
    fn from(preset: VideoPreset) -> Self {
        Self {
            preset,
            height: preset.height(),
            video_bitrate: preset.video_bitrate().to_string(),
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            speed_preset: DEFAULT_PRESET.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

impl Default for VideoProfile {
    fn default() -> Self {
        VideoPreset::default().into()
    }
}

/// How the audio stream is written during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum AudioEncoding {
    /// libmp3lame at a fixed VBR quality
    Mp3 { quality: u8 },
    /// Signed 16-bit little-endian PCM
    Pcm { sample_rate: u32, channels: u8 },
    /// libvorbis at a fixed VBR quality
    Vorbis { quality: u8 },
    /// Keep the source audio codec untouched
    StreamCopy,
}

impl AudioEncoding {
    /// FFmpeg codec name passed to `-c:a`.
    pub fn codec(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 { .. } => "libmp3lame",
            AudioEncoding::Pcm { .. } => "pcm_s16le",
            AudioEncoding::Vorbis { .. } => "libvorbis",
            AudioEncoding::StreamCopy => "copy",
        }
    }
}

/// Fully resolved settings for an audio extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProfile {
    /// Output container / file extension (lowercase, alphanumeric)
    pub format: String,
    pub encoding: AudioEncoding,
}

impl AudioProfile {
    pub fn content_type(&self) -> String {
        format!("audio/{}", self.format)
    }

    pub fn is_stream_copy(&self) -> bool {
        matches!(self.encoding, AudioEncoding::StreamCopy)
    }
}

impl From<AudioFormat> for AudioProfile {
    fn from(format: AudioFormat) -> Self {
        Self {
            format: format.as_str().to_string(),
            encoding: format.encoding(),
        }
    }
}

/// Encoder settings for one job. The variant fixes the job kind, so every
/// field the encoder needs is present by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeProfile {
    Video(VideoProfile),
    Audio(AudioProfile),
}

impl EncodeProfile {
    pub fn job_kind(&self) -> JobKind {
        match self {
            EncodeProfile::Video(_) => JobKind::VideoTranscode,
            EncodeProfile::Audio(_) => JobKind::AudioExtraction,
        }
    }

    /// Extension of the encoder's output file.
    pub fn output_extension(&self) -> &str {
        match self {
            EncodeProfile::Video(_) => VIDEO_CONTAINER,
            EncodeProfile::Audio(audio) => &audio.format,
        }
    }

    /// MIME type of the converted bytes.
    pub fn content_type(&self) -> String {
        match self {
            EncodeProfile::Video(_) => VIDEO_CONTENT_TYPE.to_string(),
            EncodeProfile::Audio(audio) => audio.content_type(),
        }
    }
}
