//! Shared data models for mconv.
//!
//! This crate provides Serde-serializable types for:
//! - Conversion jobs and requests
//! - Video presets and audio target formats
//! - Resolved encoder profiles and encoding constants

pub mod encoding;
pub mod job;

// Re-export common types
pub use encoding::{
    AudioEncoding, AudioFormat, AudioProfile, EncodeProfile, VideoPreset, VideoProfile,
};
pub use job::{ConversionRequest, JobId, JobKind};
