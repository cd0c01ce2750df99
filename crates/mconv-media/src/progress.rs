//! FFmpeg progress parsing.
//!
//! With `-progress pipe:2` FFmpeg interleaves `key=value` progress records
//! with its regular diagnostics on stderr. The parser splits the two so the
//! diagnostic log only keeps text that explains a failure.

use serde::Serialize;

/// Keys FFmpeg emits in a progress block.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Snapshot of encoder progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub fps: f64,
    /// Encoded output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Output bytes written so far
    pub total_size: u64,
    /// Set on the final block
    pub is_complete: bool,
}

/// Classification of one stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// Part of a progress block; nothing to report yet
    Progress,
    /// A progress block just ended
    ProgressBlock(FfmpegProgress),
    /// Regular diagnostic text
    Diagnostic,
}

/// Incremental parser over FFmpeg stderr lines.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator).
    pub fn feed(&mut self, line: &str) -> StderrLine {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            return StderrLine::Diagnostic;
        };
        let key = key.trim();
        let value = value.trim();

        if !is_progress_key(key) {
            return StderrLine::Diagnostic;
        }

        match key {
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.current.fps = fps;
                }
            }
            // out_time_ms is in microseconds despite its name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "total_size" => {
                if let Ok(size) = value.parse() {
                    self.current.total_size = size;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.is_complete = value == "end";
                return StderrLine::ProgressBlock(self.current.clone());
            }
            _ => {}
        }

        StderrLine::Progress
    }
}

fn is_progress_key(key: &str) -> bool {
    // Per-stream quality keys look like stream_0_0_q
    PROGRESS_KEYS.contains(&key) || key.starts_with("stream_")
}
