//! FFmpeg-backed media conversion.
//!
//! This crate provides:
//! - Temp file staging with guaranteed cleanup
//! - Profile resolution from preset names and audio formats
//! - FFmpeg argument building and progress parsing
//! - Encoder process supervision with deadlines and bounded concurrency
//! - The conversion job lifecycle and the [`Converter`] service

pub mod command;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod progress;
pub mod staging;
pub mod supervisor;

pub use command::{build_args, encoder_available, locate_ffmpeg, FfmpegCommand};
pub use config::EncoderConfig;
pub use converter::Converter;
pub use error::{ConversionError, ErrorKind, MediaResult};
pub use job::{ConversionJob, ConversionResult, ConvertedMedia, JobReport, JobStage};
pub use profile::{resolve_audio_profile, resolve_profile, resolve_video_profile};
pub use progress::{FfmpegProgress, ProgressParser};
pub use staging::{TempFile, TempFileRole, TempFileStager};
pub use supervisor::{ProcessOutcome, ProcessSupervisor};
