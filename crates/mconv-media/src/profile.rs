//! Profile resolution: preset names and format strings to encoder settings.
//!
//! Resolution never fails. Unknown video presets fall back to 720p; audio
//! formats without fixed settings are stream-copied into a container named
//! after the requested format instead of being rejected.

use tracing::{debug, warn};

use mconv_models::{
    AudioEncoding, AudioFormat, AudioProfile, EncodeProfile, JobKind, VideoPreset, VideoProfile,
};

use crate::staging::sanitize_extension;

/// Audio format used when the request names none.
pub const DEFAULT_AUDIO_FORMAT: AudioFormat = AudioFormat::Mp3;

/// Resolve the encoder settings for a job.
pub fn resolve_profile(kind: JobKind, selector: Option<&str>) -> EncodeProfile {
    match kind {
        JobKind::VideoTranscode => EncodeProfile::Video(resolve_video_profile(selector)),
        JobKind::AudioExtraction => EncodeProfile::Audio(resolve_audio_profile(selector)),
    }
}

/// Resolve a video preset name, defaulting to 720p.
pub fn resolve_video_profile(selector: Option<&str>) -> VideoProfile {
    let preset = match selector.map(str::trim).filter(|s| !s.is_empty()) {
        None => VideoPreset::default(),
        Some(name) => VideoPreset::parse(name).unwrap_or_else(|| {
            debug!(preset = name, "Unknown video preset, using {}", VideoPreset::default());
            VideoPreset::default()
        }),
    };
    preset.into()
}

/// Resolve an audio target format.
///
/// `mp3`, `wav` and `ogg` get fixed encoder settings. Any other usable
/// format name keeps the source codec (stream copy); a missing or unusable
/// name means mp3.
pub fn resolve_audio_profile(selector: Option<&str>) -> AudioProfile {
    let Some(format) = selector.and_then(sanitize_extension) else {
        return DEFAULT_AUDIO_FORMAT.into();
    };

    match AudioFormat::parse(&format) {
        Some(known) => known.into(),
        None => {
            warn!(
                format = %format,
                "No encoder settings for audio format, copying source audio stream"
            );
            AudioProfile {
                format,
                encoding: AudioEncoding::StreamCopy,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mconv_models::encoding::{DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_VIDEO_CODEC};

    #[test]
    fn test_every_preset_resolves_to_table() {
        let expected = [
            ("240p", 240, "400k"),
            ("360p", 360, "800k"),
            ("480p", 480, "1500k"),
            ("720p", 720, "3000k"),
            ("1080p", 1080, "5000k"),
            ("1440p", 1440, "8000k"),
        ];

        for (name, height, bitrate) in expected {
            let profile = resolve_video_profile(Some(name));
            assert_eq!(profile.height, height, "preset {}", name);
            assert_eq!(profile.video_bitrate, bitrate, "preset {}", name);
            assert_eq!(profile.video_codec, DEFAULT_VIDEO_CODEC);
            assert_eq!(profile.audio_codec, DEFAULT_AUDIO_CODEC);
            assert_eq!(profile.audio_bitrate, DEFAULT_AUDIO_BITRATE);
        }
    }

    #[test]
    fn test_unknown_or_missing_preset_defaults_to_720p() {
        for selector in [None, Some(""), Some("   "), Some("4k"), Some("720"), Some("best")] {
            let profile = resolve_video_profile(selector);
            assert_eq!(profile.preset, VideoPreset::P720, "selector {:?}", selector);
            assert_eq!(profile.height, 720);
            assert_eq!(profile.video_bitrate, "3000k");
        }
    }

    #[test]
    fn test_known_audio_formats() {
        assert_eq!(
            resolve_audio_profile(Some("mp3")).encoding,
            AudioEncoding::Mp3 { quality: 2 }
        );
        assert_eq!(
            resolve_audio_profile(Some("WAV")).encoding,
            AudioEncoding::Pcm {
                sample_rate: 44_100,
                channels: 2
            }
        );
        assert_eq!(
            resolve_audio_profile(Some("ogg")).encoding,
            AudioEncoding::Vorbis { quality: 4 }
        );
    }

    #[test]
    fn test_unknown_audio_format_is_stream_copy() {
        let profile = resolve_audio_profile(Some("flac"));
        assert!(profile.is_stream_copy());
        assert_eq!(profile.format, "flac");
        assert_eq!(profile.content_type(), "audio/flac");
    }

    #[test]
    fn test_audio_format_is_sanitized() {
        let profile = resolve_audio_profile(Some("../m4a"));
        assert_eq!(profile.format, "m4a");
        assert!(profile.is_stream_copy());
    }

    #[test]
    fn test_missing_audio_format_defaults_to_mp3() {
        for selector in [None, Some(""), Some("./")] {
            let profile = resolve_audio_profile(selector);
            assert_eq!(profile.format, "mp3", "selector {:?}", selector);
            assert_eq!(profile.encoding, AudioEncoding::Mp3 { quality: 2 });
        }
    }

    #[test]
    fn test_resolve_profile_dispatches_on_kind() {
        let video = resolve_profile(JobKind::VideoTranscode, Some("1080p"));
        assert_eq!(video.job_kind(), JobKind::VideoTranscode);

        let audio = resolve_profile(JobKind::AudioExtraction, Some("ogg"));
        assert_eq!(audio.job_kind(), JobKind::AudioExtraction);
        assert_eq!(audio.output_extension(), "ogg");
    }
}
